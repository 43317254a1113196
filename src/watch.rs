//! Change detection for the configuration file and the watched Makefiles.
//!
//! Each `arm` call registers one OS watcher over the parent directories of the
//! watched paths and starts a bridge thread. The first create, write, remove or
//! rename touching a watched path sends a single `Event::WatchFired` to the
//! main loop; everything after that is ignored until the next `arm`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use notify::event::ModifyKind;
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::Event;

/// Live registration created by [`arm`].
///
/// Dropping or disarming it releases the OS watch descriptors and ends the
/// bridge thread.
pub struct WatchHandle {
    generation: u64,
    watched_dirs: usize,
    _watcher: RecommendedWatcher,
}

impl WatchHandle {
    /// Arm cycle this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn watched_dirs(&self) -> usize {
        self.watched_dirs
    }

    /// Releases the watcher. Consumes the handle, so it runs once per arm.
    pub fn disarm(self) {
        debug!("disarming watcher generation {}", self.generation);
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("generation", &self.generation)
            .field("watched_dirs", &self.watched_dirs)
            .finish()
    }
}

/// Starts watching `paths` and reports the first relevant change on `tx`.
///
/// Directories are watched rather than files so that editors replacing a
/// file through rename, and files created after arming, are still seen.
/// Directories that cannot be registered are skipped; failing to register any
/// of them is an error.
pub fn arm(
    paths: &BTreeSet<PathBuf>,
    generation: u64,
    tx: mpsc::Sender<Event>,
) -> Result<WatchHandle> {
    let matcher = PathMatcher::new(paths);
    let dirs: BTreeSet<PathBuf> = paths
        .iter()
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect();

    let (raw_tx, raw_rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = raw_tx.send(res);
        },
        notify::Config::default(),
    )
    .context("failed to create watcher")?;

    let mut watched_dirs = 0;
    for dir in &dirs {
        match watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => watched_dirs += 1,
            Err(err) => warn!("cannot watch {}: {}", dir.display(), err),
        }
    }
    if watched_dirs == 0 {
        bail!("none of {} watch directories could be registered", dirs.len());
    }

    std::thread::spawn(move || {
        while let Ok(res) = raw_rx.recv() {
            match res {
                Ok(event) => {
                    if let Some(path) = matcher.relevant_path(&event) {
                        info!("change detected in {} - reloading", path.display());
                        let _ = tx.blocking_send(Event::WatchFired { generation, path });
                        return;
                    }
                }
                Err(err) => warn!("watch error: {}", err),
            }
        }
    });

    Ok(WatchHandle {
        generation,
        watched_dirs,
        _watcher: watcher,
    })
}

fn is_qualifying(kind: &EventKind) -> bool {
    match kind {
        EventKind::Any | EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(_) | EventKind::Other => false,
    }
}

struct PathMatcher {
    // Lexical paths plus, where the parent exists, their canonical spelling.
    // Some backends report canonical paths (e.g. /private/var on macOS).
    keys: BTreeSet<PathBuf>,
}

impl PathMatcher {
    fn new(paths: &BTreeSet<PathBuf>) -> Self {
        let mut keys = BTreeSet::new();
        for path in paths {
            keys.insert(path.clone());
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                if let Ok(canonical) = std::fs::canonicalize(parent) {
                    keys.insert(canonical.join(name));
                }
            }
        }
        Self { keys }
    }

    fn relevant_path(&self, event: &NotifyEvent) -> Option<PathBuf> {
        if !is_qualifying(&event.kind) {
            return None;
        }
        event
            .paths
            .iter()
            .find(|path| self.keys.contains(*path))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RenameMode};
    use std::fs;
    use std::time::Duration;
    use tokio::time::timeout;

    fn event(kind: EventKind, path: &Path) -> NotifyEvent {
        NotifyEvent::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn only_write_create_remove_and_rename_qualify() {
        let path = PathBuf::from("/srv/api/Makefile");
        let matcher = PathMatcher::new(&BTreeSet::from([path.clone()]));

        let writes = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &path);
        let renames = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &path);
        let creates = event(EventKind::Create(CreateKind::File), &path);
        let chmod = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &path,
        );
        let reads = event(EventKind::Access(AccessKind::Any), &path);

        assert_eq!(matcher.relevant_path(&writes), Some(path.clone()));
        assert_eq!(matcher.relevant_path(&renames), Some(path.clone()));
        assert_eq!(matcher.relevant_path(&creates), Some(path.clone()));
        assert_eq!(matcher.relevant_path(&chmod), None);
        assert_eq!(matcher.relevant_path(&reads), None);
    }

    #[test]
    fn siblings_in_a_watched_directory_are_ignored() {
        let path = PathBuf::from("/srv/api/Makefile");
        let matcher = PathMatcher::new(&BTreeSet::from([path]));
        let sibling = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            Path::new("/srv/api/main.go"),
        );
        assert_eq!(matcher.relevant_path(&sibling), None);
    }

    #[test]
    fn arming_without_any_existing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = BTreeSet::from([dir.path().join("missing").join("Makefile")]);
        let (tx, _rx) = mpsc::channel(4);
        assert!(arm(&paths, 1, tx).is_err());
    }

    #[tokio::test]
    async fn two_writes_in_one_cycle_signal_once() {
        let dir = tempfile::tempdir().unwrap();
        let makefile = dir.path().join("Makefile");
        fs::write(&makefile, "a:\n").unwrap();
        let paths = BTreeSet::from([makefile.clone()]);

        let (tx, mut rx) = mpsc::channel(16);
        let handle = arm(&paths, 7, tx).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&makefile, "a:\nb:\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        fs::write(&makefile, "a:\nb:\nc:\n").unwrap();

        let first = timeout(Duration::from_secs(3), rx.recv()).await.unwrap();
        match first {
            Some(Event::WatchFired { generation, .. }) => assert_eq!(generation, 7),
            other => panic!("unexpected event: {:?}", other),
        }
        let second = timeout(Duration::from_millis(700), rx.recv()).await;
        assert!(!matches!(second, Ok(Some(_))));
        handle.disarm();
    }

    #[tokio::test]
    async fn unrelated_files_do_not_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let makefile = dir.path().join("Makefile");
        fs::write(&makefile, "a:\n").unwrap();
        let paths = BTreeSet::from([makefile.clone()]);

        let (tx, mut rx) = mpsc::channel(16);
        let handle = arm(&paths, 1, tx).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

        fs::remove_file(&makefile).unwrap();
        let fired = timeout(Duration::from_secs(3), rx.recv()).await.unwrap();
        assert!(matches!(fired, Some(Event::WatchFired { .. })));
        handle.disarm();
    }

    #[tokio::test]
    async fn disarmed_watcher_stays_silent() {
        let dir = tempfile::tempdir().unwrap();
        let makefile = dir.path().join("Makefile");
        fs::write(&makefile, "a:\n").unwrap();
        let paths = BTreeSet::from([makefile.clone()]);

        let (tx, mut rx) = mpsc::channel(16);
        arm(&paths, 1, tx).unwrap().disarm();
        fs::write(&makefile, "b:\n").unwrap();

        let next = timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(!matches!(next, Ok(Some(_))));
    }
}
