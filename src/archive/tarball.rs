// src/archive/tarball.rs

//! Tar archive reader
//!
//! Reads plain `.tar` packages as well as gzip, xz, and zstd compressed
//! tarballs. Compression is detected from the file extension.

use super::{
    ArchiveEntry, ArchiveReader, EntryHeader, EntryKind, ScanEnd, Visit, normalize_entry_path,
};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::trace;
use xz2::read::XzDecoder;

/// Package compression format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

/// Recognized package file extensions, in lookup order
pub const ARCHIVE_EXTENSIONS: &[(&str, Compression)] = &[
    (".tar", Compression::None),
    (".tar.gz", Compression::Gzip),
    (".tgz", Compression::Gzip),
    (".tar.xz", Compression::Xz),
    (".tar.zst", Compression::Zstd),
];

impl Compression {
    /// Detect compression format from file extension
    ///
    /// Unrecognized extensions are read as plain tar.
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        ARCHIVE_EXTENSIONS
            .iter()
            .find(|(ext, _)| name.ends_with(ext))
            .map(|(_, compression)| *compression)
            .unwrap_or(Compression::None)
    }
}

/// Package name for an archive path: the file name without its archive extension
pub fn package_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();

    for (ext, _) in ARCHIVE_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            if !stem.is_empty() {
                return Some(stem.to_string());
            }
        }
    }

    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// A tar package on disk
#[derive(Debug, Clone)]
pub struct TarArchive {
    path: PathBuf,
    compression: Compression,
}

impl TarArchive {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::archive(&path, "archive does not exist or is not a file"));
        }

        let compression = Compression::detect(&path);
        trace!("Opening {} ({:?})", path.display(), compression);

        Ok(Self { path, compression })
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Open and decompress the package archive
    fn open_archive(&self) -> Result<Archive<Box<dyn Read>>> {
        let file = File::open(&self.path)
            .map_err(|e| Error::archive(&self.path, format!("Failed to open package file: {}", e)))?;
        let file = BufReader::new(file);

        let reader: Box<dyn Read> = match self.compression {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::Xz => Box::new(XzDecoder::new(file)),
            Compression::Zstd => {
                let decoder = zstd::Decoder::new(file).map_err(|e| {
                    Error::archive(&self.path, format!("Failed to create zstd decoder: {}", e))
                })?;
                Box::new(decoder)
            }
        };

        let mut archive = Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);
        archive.set_unpack_xattrs(true);
        archive.set_overwrite(true);
        Ok(archive)
    }

    fn read_header<R: Read>(&self, entry: &tar::Entry<'_, R>) -> Result<EntryHeader> {
        let raw_path = entry
            .path()
            .map_err(|e| Error::archive(&self.path, format!("Failed to get entry path: {}", e)))?;

        let entry_type = entry.header().entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_hard_link() {
            EntryKind::Hardlink
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        let mode = entry
            .header()
            .mode()
            .map_err(|e| Error::archive(&self.path, format!("Failed to get file mode: {}", e)))?;

        let size = entry
            .header()
            .size()
            .map_err(|e| Error::archive(&self.path, format!("Failed to get file size: {}", e)))?;

        Ok(EntryHeader {
            path: normalize_entry_path(&raw_path),
            kind,
            mode,
            size,
        })
    }
}

impl ArchiveReader for TarArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn scan(
        &self,
        visit: &mut dyn FnMut(&mut dyn ArchiveEntry) -> Result<Visit>,
    ) -> Result<ScanEnd> {
        let mut archive = self.open_archive()?;

        let entries = archive.entries().map_err(|e| {
            Error::archive(&self.path, format!("Failed to read archive entries: {}", e))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::archive(&self.path, format!("Failed to read archive entry: {}", e))
            })?;

            let header = self.read_header(&entry)?;
            let mut entry = TarEntry {
                entry,
                header,
                archive_path: &self.path,
            };

            if visit(&mut entry)? == Visit::Stop {
                return Ok(ScanEnd::Stopped);
            }
        }

        Ok(ScanEnd::EndOfArchive)
    }
}

struct TarEntry<'a, 'p> {
    entry: tar::Entry<'a, Box<dyn Read>>,
    header: EntryHeader,
    archive_path: &'p Path,
}

impl ArchiveEntry for TarEntry<'_, '_> {
    fn header(&self) -> &EntryHeader {
        &self.header
    }

    fn extract_under(&mut self, root: &Path) -> Result<()> {
        match self.entry.unpack_in(root) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::archive(
                self.archive_path,
                format!(
                    "Refusing to extract {} outside of {}",
                    self.header.path.display(),
                    root.display()
                ),
            )),
            Err(e) => Err(Error::archive(
                self.archive_path,
                format!("Failed to extract {}: {}", self.header.path.display(), e),
            )),
        }
    }

    fn extract_to(&mut self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        self.entry.unpack(dest).map_err(|e| {
            Error::archive(
                self.archive_path,
                format!(
                    "Failed to extract {} to {}: {}",
                    self.header.path.display(),
                    dest.display(),
                    e
                ),
            )
        })?;

        Ok(())
    }
}
