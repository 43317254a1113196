//! Target discovery for Makefiles.
//!
//! Only plain `name:` rules are recognized. Pattern rules, multi-target rules
//! and anything built from variables are skipped without complaint.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_.\-]+):").expect("rule pattern compiles"));

const PHONY: &str = ".PHONY";

/// Reads `path` and returns its simple targets, sorted and de-duplicated.
pub fn parse_targets(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    scan_targets(BufReader::new(file))
        .with_context(|| format!("failed to read {}", path.display()))
}

fn scan_targets<R: BufRead>(mut reader: R) -> std::io::Result<Vec<String>> {
    let mut targets = BTreeSet::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // Lossy: Makefiles are not always UTF-8.
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if line.is_empty() || line.starts_with('\t') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = RULE.captures(&line).and_then(|caps| caps.get(1)) {
            if name.as_str() != PHONY {
                targets.insert(name.as_str().to_string());
            }
        }
    }
    Ok(targets.into_iter().collect())
}
