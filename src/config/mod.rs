// src/config/mod.rs

//! Key/value configuration files
//!
//! Config files are line oriented:
//! - lines starting with `#` are comments
//! - `key=value` pairs split on the first unescaped `=`
//! - a `=` preceded by a backslash does not split the line
//!
//! Malformed lines are logged and skipped; they never abort a parse.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{trace, warn};

/// Character which introduces a comment line
pub const COMMENT_CHAR: char = '#';

/// Character separating keys from values
pub const DELIM_CHAR: char = '=';

/// Character escaping a delimiter inside a key
pub const ESCAPE_CHAR: char = '\\';

/// Parsed key/value pairs from one or more config files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    values: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw lines using the default delimiter and comment character
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        Self::parse_with(lines, DELIM_CHAR, COMMENT_CHAR)
    }

    /// Parse raw lines with an explicit delimiter and comment character
    ///
    /// A later line with a duplicate key overwrites the earlier value.
    pub fn parse_with<S: AsRef<str>>(lines: &[S], delim: char, comment: char) -> Self {
        let mut values = BTreeMap::new();

        for (index, line) in lines.iter().enumerate() {
            let line = line.as_ref();

            if line.is_empty() || line.starts_with(comment) {
                continue;
            }

            let split = match find_delim(line, delim) {
                Some(pos) if pos > 0 => pos,
                _ => {
                    warn!(
                        "Config line {} (\"{}\") has no key/value delimiter, ignoring",
                        index + 1,
                        line
                    );
                    continue;
                }
            };

            let key = &line[..split];
            let value = &line[split + delim.len_utf8()..];

            if value.is_empty() {
                warn!("Configuration option {} has no value, ignoring", key);
                continue;
            }

            values.insert(key.to_string(), value.to_string());
        }

        Self { values }
    }

    /// Read and parse a config file
    ///
    /// An unreadable file is reported as [`Error::FileRead`] so the caller can
    /// decide whether a missing layer matters.
    pub fn load(path: &Path) -> Result<Self> {
        let lines = read_lines(path)?;
        let map = Self::parse(&lines);
        trace!(
            "Loaded {} option(s) from {}",
            map.len(),
            path.display()
        );
        Ok(map)
    }

    /// Overlay `overlay` onto a copy of `base`; keys in `overlay` win
    pub fn merge(base: &ConfigMap, overlay: &ConfigMap) -> ConfigMap {
        let mut merged = base.clone();
        merged.merge_from(overlay);
        merged
    }

    /// Overlay another mapping onto this one in place
    pub fn merge_from(&mut self, overlay: &ConfigMap) {
        for (key, value) in &overlay.values {
            trace!("Merging config key {} = {}", key, value);
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Byte index of the first delimiter not preceded by the escape character
///
/// Returns `Some(0)` for a line starting with the delimiter; callers treat
/// that as an empty key.
pub fn find_delim(line: &str, delim: char) -> Option<usize> {
    let mut previous = None;

    for (pos, c) in line.char_indices() {
        if c == delim && previous != Some(ESCAPE_CHAR) {
            return Some(pos);
        }
        previous = Some(c);
    }

    None
}

/// Read a file as lines without requiring it to be valid UTF-8
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines: Vec<String> = bytes
        .split(|b| *b == b'\n')
        .map(|raw| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            String::from_utf8_lossy(raw).into_owned()
        })
        .collect();

    // A trailing newline does not start another line
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    Ok(lines)
}
