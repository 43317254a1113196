//! Launching Makefile targets in an interactive terminal.
//!
//! The command line `cd <dir> && make -f <file> <target>` is built with every
//! path and name shell-quoted, then substituted into a terminal template such
//! as `x-terminal-emulator -e sh -c {cmd}`. Launches run as detached
//! background tasks; failures are only logged.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::paths;

/// Placeholder replaced by the raw shell command line.
const CMD: &str = "{cmd}";
/// Placeholder replaced by the command line escaped for an AppleScript string.
const CMD_APPLESCRIPT: &str = "{cmd:applescript}";

#[cfg(target_os = "macos")]
pub const DEFAULT_TERMINAL: &str = r#"osascript -e 'tell application "Terminal"' -e activate -e 'do script "{cmd:applescript}"' -e 'end tell'"#;
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_TERMINAL: &str = "x-terminal-emulator -e sh -c {cmd}";

#[cfg(target_os = "macos")]
const OPENER: &[&str] = &["open", "-t"];
#[cfg(not(target_os = "macos"))]
const OPENER: &[&str] = &["xdg-open"];

/// A terminal command with a `{cmd}` or `{cmd:applescript}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalTemplate {
    argv: Vec<String>,
}

impl TerminalTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let argv = shell_words::split(template)
            .with_context(|| format!("failed to parse terminal template {:?}", template))?;
        if argv.is_empty() {
            bail!("terminal template is empty");
        }
        if !argv
            .iter()
            .any(|arg| arg.contains(CMD) || arg.contains(CMD_APPLESCRIPT))
        {
            bail!("terminal template must contain {} or {}", CMD, CMD_APPLESCRIPT);
        }
        Ok(Self { argv })
    }

    /// Substitutes `command_line` into the template.
    pub fn render(&self, command_line: &str) -> Vec<String> {
        let escaped = applescript_escape(command_line);
        self.argv
            .iter()
            .map(|arg| substitute(arg, command_line, &escaped))
            .collect()
    }
}

// Single left-to-right pass: inserted text is never scanned for placeholders.
fn substitute(arg: &str, raw: &str, escaped: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(idx) = rest.find('{') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if let Some(after) = tail.strip_prefix(CMD_APPLESCRIPT) {
            out.push_str(escaped);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(CMD) {
            out.push_str(raw);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// `make -f <file> <target>` with both arguments quoted for a POSIX shell.
pub fn make_invocation(makefile: &Path, target: &str) -> String {
    format!(
        "make -f {} {}",
        shell_words::quote(&makefile.to_string_lossy()),
        shell_words::quote(target)
    )
}

/// Full shell command: change into the Makefile's directory and run the target.
pub fn command_line(makefile: &Path, target: &str) -> String {
    let makefile = paths::resolve(&makefile.to_string_lossy());
    let dir = makefile.parent().unwrap_or_else(|| Path::new("/"));
    format!(
        "cd {} && {}",
        shell_words::quote(&dir.to_string_lossy()),
        make_invocation(&makefile, target)
    )
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Opens a terminal running `target`. Returns immediately.
pub fn launch(template: &TerminalTemplate, makefile: &Path, target: &str) {
    let command_line = command_line(makefile, target);
    let argv = template.render(&command_line);
    let target = target.to_string();
    let makefile_name = paths::parent_dir_name(makefile);
    info!("launching {}", command_line);
    tokio::spawn(async move {
        if let Err(err) = run_detached(&argv).await {
            warn!("unable to run target {} ({}): {:#}", target, makefile_name, err);
        }
    });
}

/// Opens the configuration file with the platform's default editor.
pub fn open_config(path: &Path) {
    let argv: Vec<String> = OPENER
        .iter()
        .map(|arg| arg.to_string())
        .chain(std::iter::once(path.display().to_string()))
        .collect();
    tokio::spawn(async move {
        if let Err(err) = run_detached(&argv).await {
            warn!("unable to open config: {:#}", err);
        }
    });
}

async fn run_detached(argv: &[String]) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        bail!("empty command");
    };
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    // Own process group: terminal signals aimed at us must not reach it.
    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            let _ = libc::setpgid(0, 0);
            Ok(())
        });
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("failed to spawn {}", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} exited with {}: {}",
            program,
            output.status.code().unwrap_or(1),
            stderr.trim()
        );
    }
    debug!("{} finished", program);
    Ok(())
}
