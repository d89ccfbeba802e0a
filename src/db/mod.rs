// src/db/mod.rs

//! Installed package database
//!
//! The database is a directory holding one zero-byte marker file per
//! followed package. A marker's existence is the entire record; its
//! modification time doubles as the time the package was followed.

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// Result of a follow/unfollow request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerChange {
    /// The marker was created or removed
    Changed,
    /// The marker was already in the requested state
    Unchanged,
}

/// A followed package as recorded in the index
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub followed_at: Option<DateTime<Local>>,
}

/// The installed-index directory
#[derive(Debug, Clone)]
pub struct InstalledIndex {
    dir: PathBuf,
}

impl InstalledIndex {
    /// Wrap an index directory without checking it
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open an index directory, which must already exist
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::Precondition(format!(
                "The installed packages path {} must be a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn is_followed(&self, name: &str) -> bool {
        self.marker_path(name).exists()
    }

    /// Create the marker for `name` unless it already exists
    ///
    /// An existing marker is left untouched so its timestamp still records
    /// when the package was first followed.
    pub fn follow(&self, name: &str) -> Result<MarkerChange> {
        let path = self.marker_path(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Created marker {}", path.display());
                Ok(MarkerChange::Changed)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(MarkerChange::Unchanged),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the marker for `name` if present
    pub fn unfollow(&self, name: &str) -> Result<MarkerChange> {
        let path = self.marker_path(name);

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed marker {}", path.display());
                Ok(MarkerChange::Changed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MarkerChange::Unchanged),
            Err(e) => Err(e.into()),
        }
    }

    /// List followed packages sorted by name
    pub fn list(&self) -> Result<Vec<InstalledPackage>> {
        let mut packages = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                Error::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::other("filesystem loop while listing the package index")
                }))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let followed_at = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Local>::from);

            packages.push(InstalledPackage { name, followed_at });
        }

        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }
}
