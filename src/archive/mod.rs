// src/archive/mod.rs

//! Sequential access to package archives
//!
//! The package lifecycle only needs to walk an archive's entries in order,
//! look at each entry's header, and extract some of them. [`ArchiveReader`]
//! exposes exactly that; [`TarArchive`] implements it over the `tar` crate.

mod tarball;

pub use tarball::{ARCHIVE_EXTENSIONS, Compression, TarArchive, package_name};

use crate::error::Result;
use std::path::{Component, Path, PathBuf};

/// Kind of filesystem object an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Hardlink,
    Other,
}

/// Metadata for one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Archive-relative path with `.` and leading `/` components removed
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
}

impl EntryHeader {
    /// True for the entry naming the archive root itself (e.g. `./`)
    pub fn is_root(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

/// Whether a scan should keep going after an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    EndOfArchive,
    Stopped,
}

/// One entry of an archive being scanned
pub trait ArchiveEntry {
    fn header(&self) -> &EntryHeader;

    /// Extract this entry at `root/<entry path>`
    ///
    /// Preserves permissions and extended attributes. Entries whose path
    /// contains `..` are refused with an error.
    fn extract_under(&mut self, root: &Path) -> Result<()>;

    /// Extract this entry's content to exactly `dest`
    fn extract_to(&mut self, dest: &Path) -> Result<()>;
}

/// Common interface for package archive readers
pub trait ArchiveReader {
    /// Path of the archive on disk
    fn path(&self) -> &Path;

    /// Visit every entry in archive order until the visitor stops the scan
    ///
    /// An error from the archive or from the visitor ends the scan and is
    /// returned as-is.
    fn scan(
        &self,
        visit: &mut dyn FnMut(&mut dyn ArchiveEntry) -> Result<Visit>,
    ) -> Result<ScanEnd>;

    /// Read every entry header without extracting anything
    fn headers(&self) -> Result<Vec<EntryHeader>> {
        let mut headers = Vec::new();
        self.scan(&mut |entry| {
            headers.push(entry.header().clone());
            Ok(Visit::Continue)
        })?;
        Ok(headers)
    }
}

/// Strip `.`, root, and prefix components from an archive path
///
/// `..` components are kept so that extraction can refuse them.
pub fn normalize_entry_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}
