//! Normalization of user-supplied paths.
//!
//! Paths come from the JSON configuration, the `--config` flag and the
//! add-entry prompt, so they may be quoted, contain `$VAR` references or start
//! with `~/`. Resolution is best effort: every step that cannot complete leaves
//! the string as it was and moves on.

use std::path::{Component, Path, PathBuf};

/// Resolves `raw` into an absolute, lexically clean path.
///
/// Strips one layer of surrounding quotes, expands environment variables and a
/// leading `~`, then anchors relative paths at the current working directory
/// and folds `.`/`..` segments. Never fails.
pub fn resolve(raw: &str) -> PathBuf {
    resolve_with(
        raw,
        |name| std::env::var(name).ok(),
        dirs::home_dir,
        std::env::current_dir().ok(),
    )
}

fn resolve_with<E, H>(raw: &str, env: E, home: H, cwd: Option<PathBuf>) -> PathBuf
where
    E: FnMut(&str) -> Option<String>,
    H: FnOnce() -> Option<PathBuf>,
{
    let unquoted = strip_quotes(raw.trim());
    // Unknown variables are left in place rather than erased.
    let expanded = shellexpand::env_with_context_no_errors(unquoted, env);
    let expanded = shellexpand::tilde_with_context(expanded.as_ref(), || {
        home().and_then(|h| h.to_str().map(str::to_owned))
    });
    let path = PathBuf::from(expanded.as_ref());

    let absolute = if path.is_absolute() {
        path
    } else {
        match cwd {
            Some(cwd) => cwd.join(path),
            None => path,
        }
    };
    clean(&absolute)
}

fn strip_quotes(raw: &str) -> &str {
    let is_quote = |c: char| c == '"' || c == '\'';
    let raw = raw.strip_prefix(is_quote).unwrap_or(raw);
    raw.strip_suffix(is_quote).unwrap_or(raw)
}

/// Folds `.` and `..` segments without touching the file system.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Display name for a build file: the name of the directory that holds it.
pub fn parent_dir_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
