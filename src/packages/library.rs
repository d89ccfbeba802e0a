// src/packages/library.rs

//! Locating package archives in the package library

use crate::archive::{ARCHIVE_EXTENSIONS, package_name};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Resolve a package name to its archive in `library`
///
/// `<library>/<name>.tar` is preferred; the compressed variants are tried
/// next. A name that already carries an archive extension is accepted as a
/// file name.
pub fn resolve_package(library: &Path, name: &str) -> Result<PathBuf> {
    for (ext, _) in ARCHIVE_EXTENSIONS {
        let candidate = library.join(format!("{}{}", name, ext));
        if candidate.is_file() {
            debug!("Resolved {} to {}", name, candidate.display());
            return Ok(candidate);
        }
    }

    let literal = library.join(name);
    if literal.is_file() && ARCHIVE_EXTENSIONS.iter().any(|(ext, _)| name.ends_with(ext)) {
        debug!("Resolved {} to {}", name, literal.display());
        return Ok(literal);
    }

    Err(Error::PackageNotFound(library.join(format!("{}.tar", name))))
}

/// Names of every package archive in `library`, sorted and deduplicated
pub fn list_all(library: &Path) -> Result<Vec<String>> {
    if !library.is_dir() {
        return Err(Error::Precondition(format!(
            "The package library {} must be a directory",
            library.display()
        )));
    }

    let mut names = BTreeSet::new();
    for entry in WalkDir::new(library).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable library entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !ARCHIVE_EXTENSIONS.iter().any(|(ext, _)| file_name.ends_with(ext)) {
            continue;
        }

        if let Some(name) = package_name(entry.path()) {
            names.insert(name);
        }
    }

    Ok(names.into_iter().collect())
}
