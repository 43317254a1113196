//! Configuration management for make-tray.
//!
//! This module defines the JSON file that lists the watched Makefiles and
//! provides `ConfigStore`, the single owner of both the file and its in-memory
//! copy. A missing file is bootstrapped with one local entry on first load.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::paths;

/// Entry written to a freshly created configuration file.
const BOOTSTRAP_PATH: &str = "./Makefile";
const BOOTSTRAP_LABEL: &str = "Local Makefile";

/// Top-level structure of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Makefiles shown in the menu, in display order.
    #[serde(default)]
    pub makefiles: Vec<Entry>,
}

/// A single watched Makefile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Location of the Makefile. Absolute and normalized once loaded.
    pub path: PathBuf,
    /// Menu label; the containing directory name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Entry {
    /// Label shown for this entry's menu group.
    pub fn display_label(&self) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => paths::parent_dir_name(&self.path),
        }
    }
}

/// Failures while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not create config directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Owns the configuration file and the in-memory `Config` built from it.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Resolves `raw_path` and loads the configuration stored there.
    ///
    /// A missing file is created with a single bootstrap entry. Invalid JSON
    /// is reported as [`ConfigError::Parse`].
    pub fn load(raw_path: &str) -> Result<Self, ConfigError> {
        let path = paths::resolve(raw_path);
        let config = read_config(&path)?;
        Ok(Self { path, config })
    }

    /// Re-reads the file. On error the previous in-memory state is kept.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.config = read_config(&self.path)?;
        Ok(())
    }

    /// Resolved location of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn entries(&self) -> &[Entry] {
        &self.config.makefiles
    }

    /// Writes the in-memory configuration as indented JSON.
    pub fn save(&self) -> Result<(), ConfigError> {
        write_config(&self.path, &self.config)
    }

    /// Appends an entry and persists it before returning.
    ///
    /// If the write fails the entry is dropped again so memory and disk agree.
    pub fn add_entry(&mut self, raw_path: &str, label: &str) -> Result<(), ConfigError> {
        let label = label.trim();
        self.config.makefiles.push(Entry {
            path: paths::resolve(raw_path),
            label: (!label.is_empty()).then(|| label.to_string()),
        });
        if let Err(err) = self.save() {
            self.config.makefiles.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Paths the change watcher has to cover: the config file plus every entry.
    pub fn watch_paths(&self) -> BTreeSet<PathBuf> {
        std::iter::once(self.path.clone())
            .chain(self.config.makefiles.iter().map(|entry| entry.path.clone()))
            .collect()
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let config = bootstrap_config();
            write_config(path, &config)?;
            info!(
                "created stub config at {} - edit it to add your Makefiles",
                path.display()
            );
            return Ok(config);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for entry in &mut config.makefiles {
        entry.path = paths::resolve(&entry.path.to_string_lossy());
    }
    debug!(
        "loaded {} makefile entries from {}",
        config.makefiles.len(),
        path.display()
    );
    Ok(config)
}

fn write_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let mut data = serde_json::to_string_pretty(config).map_err(ConfigError::Encode)?;
    data.push('\n');
    fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn bootstrap_config() -> Config {
    Config {
        makefiles: vec![Entry {
            path: paths::resolve(BOOTSTRAP_PATH),
            label: Some(BOOTSTRAP_LABEL.to_string()),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(path: &Path) -> Config {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn store_at(dir: &Path) -> String {
        dir.join("MakeTray").join("config.json").display().to_string()
    }

    #[test]
    fn missing_file_is_bootstrapped_with_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(&store_at(dir.path())).unwrap();

        assert!(store.path().exists());
        let on_disk = read_back(store.path());
        assert_eq!(on_disk.makefiles.len(), 1);
        assert_eq!(on_disk.makefiles[0].label.as_deref(), Some(BOOTSTRAP_LABEL));
        assert_eq!(&on_disk, store.config());
    }

    #[test]
    fn entries_are_resolved_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let raw = format!(
            r#"{{ "makefiles": [ {{ "path": "\"{}/api/../web/Makefile\"" }} ] }}"#,
            dir.path().display()
        );
        fs::write(&config_path, raw).unwrap();

        let store = ConfigStore::load(&config_path.display().to_string()).unwrap();
        assert_eq!(store.entries()[0].path, dir.path().join("web").join("Makefile"));
        assert_eq!(store.entries()[0].display_label(), "web");
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();

        let err = ConfigStore::load(&config_path.display().to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn failed_reload_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::load(&store_at(dir.path())).unwrap();
        let before = store.config().clone();

        fs::write(store.path(), "[").unwrap();
        assert!(store.reload().is_err());
        assert_eq!(store.config(), &before);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = store_at(dir.path());
        let mut store = ConfigStore::load(&raw_path).unwrap();
        let config = Config {
            makefiles: vec![
                Entry {
                    path: dir.path().join("a").join("Makefile"),
                    label: Some("A".to_string()),
                },
                Entry {
                    path: dir.path().join("b").join("Makefile"),
                    label: None,
                },
                Entry {
                    path: dir.path().join("a").join("Makefile"),
                    label: Some("A again".to_string()),
                },
            ],
        };
        store.config = config.clone();
        store.save().unwrap();

        let loaded = ConfigStore::load(&raw_path).unwrap();
        loaded.save().unwrap();
        let reloaded = ConfigStore::load(&raw_path).unwrap();
        assert_eq!(reloaded.config(), &config);
    }

    #[test]
    fn absent_label_is_omitted_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::load(&store_at(dir.path())).unwrap();
        store.add_entry("/srv/tools/Makefile", "  ").unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let added = &value["makefiles"][1];
        assert_eq!(added["path"], "/srv/tools/Makefile");
        assert!(added.get("label").is_none());
        assert_eq!(store.entries()[1].display_label(), "tools");
    }

    #[test]
    fn add_entry_persists_exactly_one_more_entry() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = store_at(dir.path());
        let mut store = ConfigStore::load(&raw_path).unwrap();
        let before = read_back(store.path()).makefiles.len();

        store.add_entry("'/srv/api/Makefile'", "API").unwrap();

        let after = read_back(store.path());
        assert_eq!(after.makefiles.len(), before + 1);
        let reloaded = ConfigStore::load(&raw_path).unwrap();
        assert_eq!(reloaded.config(), store.config());
        assert_eq!(
            reloaded.entries().last().map(|e| e.path.clone()),
            Some(PathBuf::from("/srv/api/Makefile"))
        );
    }

    #[test]
    fn watch_paths_cover_config_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::load(&store_at(dir.path())).unwrap();
        store.add_entry("/srv/api/Makefile", "").unwrap();

        let paths = store.watch_paths();
        assert!(paths.contains(store.path()));
        assert!(paths.contains(Path::new("/srv/api/Makefile")));
        assert_eq!(paths.len(), 3);
    }
}
