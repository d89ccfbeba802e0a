// src/packages/mod.rs

//! Package lifecycle
//!
//! A [`Package`] is one tar archive from the package library. Installing
//! extracts its entries under the system root, uninstalling removes them
//! again deepest-first, and following records the package in the
//! installed index.

pub mod hooks;
mod library;

pub use hooks::{HookOutcome, HookPhase, HookSettings, WorkingDirGuard, run_hook};
pub use library::{list_all, resolve_package};

use crate::archive::{ArchiveReader, TarArchive, Visit, package_name};
use crate::db::{InstalledIndex, MarkerChange};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};

/// Counts from a completed install
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub extracted: usize,
    pub excluded: usize,
}

/// Counts from a completed uninstall
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallReport {
    /// Files, links and empty directories removed
    pub removed: usize,
    /// Paths already absent from the filesystem
    pub missing: usize,
    /// Directories left in place because something else lives in them
    pub non_empty_dirs: usize,
    pub excluded: usize,
    /// Paths whose removal failed
    pub failed: usize,
}

/// Outcome of removing one path
enum Removal {
    Removed,
    Missing,
    NonEmptyDir,
}

/// A package archive confirmed to exist
#[derive(Debug, Clone)]
pub struct Package {
    path: PathBuf,
    name: String,
}

impl Package {
    /// Open a package archive
    ///
    /// The path is made absolute so that hook lookups still find the archive
    /// after the working directory has moved to the system root.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::PackageNotFound(path));
        }
        let path = std::path::absolute(&path)?;

        let name = package_name(&path).ok_or_else(|| Error::PackageNotFound(path.clone()))?;
        Ok(Self { path, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn archive(&self) -> Result<TarArchive> {
        TarArchive::open(&self.path)
    }

    /// Archive-relative paths of every entry except the archive root
    pub fn contents(&self) -> Result<BTreeSet<PathBuf>> {
        Ok(self
            .archive()?
            .headers()?
            .into_iter()
            .filter(|h| !h.is_root())
            .map(|h| h.path)
            .collect())
    }

    fn check_preconditions(&self, root: &Path, index_dir: &Path) -> Result<()> {
        if !root.is_dir() {
            return Err(Error::Precondition(format!(
                "The system root {} must be a directory",
                root.display()
            )));
        }
        if !index_dir.is_dir() {
            return Err(Error::Precondition(format!(
                "The installed packages path {} must be a directory",
                index_dir.display()
            )));
        }
        if !self.path.is_file() {
            return Err(Error::Precondition(format!(
                "The package archive {} does not exist",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Extract the package under `root`
    ///
    /// Entries matching `exclusions` (as archive paths or as paths under
    /// `root`) and the hook scripts are skipped. The first extraction error
    /// ends the install; entries already extracted stay in place.
    pub fn install(
        &self,
        root: &Path,
        index_dir: &Path,
        exclusions: &BTreeSet<PathBuf>,
    ) -> Result<InstallReport> {
        self.check_preconditions(root, index_dir)?;
        let archive = self.archive()?;
        let exclusions = with_hook_scripts(exclusions);
        let mut report = InstallReport::default();

        archive.scan(&mut |entry| {
            let path = entry.header().path.clone();
            if path.as_os_str().is_empty() {
                return Ok(Visit::Continue);
            }

            let dest = root.join(&path);
            if is_excluded(&exclusions, &path, &dest) {
                debug!("Skipping excluded entry {}", path.display());
                report.excluded += 1;
                return Ok(Visit::Continue);
            }

            trace!("Extracting {}", dest.display());
            entry.extract_under(root)?;
            report.extracted += 1;
            Ok(Visit::Continue)
        })?;

        debug!(
            "Extracted {} entries from {} ({} excluded)",
            report.extracted, self.name, report.excluded
        );
        Ok(report)
    }

    /// Run the pre-install hook, install, run the post-install hook, follow
    pub fn install_with_scripts(
        &self,
        root: &Path,
        index_dir: &Path,
        exclusions: &BTreeSet<PathBuf>,
        hooks: &HookSettings,
    ) -> Result<InstallReport> {
        self.check_preconditions(root, index_dir)?;
        let archive = self.archive()?;

        self.run_pre_hook(&archive, root, HookPhase::PreInstall, hooks)?;
        let report = self.install(root, index_dir, exclusions)?;
        self.run_post_hook(&archive, root, HookPhase::PostInstall, hooks)?;

        if self.follow(index_dir) {
            info!("The package {} has been installed", self.name);
        } else {
            warn!(
                "The package {} appears to have been installed, but the package database was not updated",
                self.name
            );
        }
        Ok(report)
    }

    /// Remove the package's entries from under `root`, deepest paths first
    ///
    /// `contents` is read from the archive when not supplied. Per-path
    /// failures are logged and counted; only a failed precondition or an
    /// unreadable archive is an error.
    pub fn uninstall(
        &self,
        contents: Option<&BTreeSet<PathBuf>>,
        root: &Path,
        index_dir: &Path,
        exclusions: &BTreeSet<PathBuf>,
    ) -> Result<UninstallReport> {
        self.check_preconditions(root, index_dir)?;

        let read_contents;
        let contents = match contents {
            Some(contents) => contents,
            None => {
                read_contents = self.contents()?;
                &read_contents
            }
        };

        let exclusions = with_hook_scripts(exclusions);
        let mut report = UninstallReport::default();

        for rel in contents.iter().rev() {
            if rel.as_os_str().is_empty() {
                continue;
            }

            let path = root.join(rel);
            if is_excluded(&exclusions, rel, &path) {
                debug!("Skipping excluded path {}", path.display());
                report.excluded += 1;
                continue;
            }

            match remove_path(&path) {
                Ok(Removal::Removed) => {
                    trace!("Removed {}", path.display());
                    report.removed += 1;
                }
                Ok(Removal::Missing) => {
                    warn!("The path {} did not exist in the filesystem, continuing", path.display());
                    report.missing += 1;
                }
                Ok(Removal::NonEmptyDir) => {
                    info!("The directory {} is not empty, leaving it in place", path.display());
                    report.non_empty_dirs += 1;
                }
                Err(e) => {
                    warn!("Could not remove {}: {}", path.display(), e);
                    if let Some(errno) = e.raw_os_error() {
                        trace!("OS error number {} for {}", errno, path.display());
                    }
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Removed {} paths of {} ({} missing, {} non-empty directories, {} failed)",
            report.removed, self.name, report.missing, report.non_empty_dirs, report.failed
        );
        Ok(report)
    }

    /// Run the pre-uninstall hook, uninstall, run the post-uninstall hook, unfollow
    pub fn uninstall_with_scripts(
        &self,
        root: &Path,
        index_dir: &Path,
        exclusions: &BTreeSet<PathBuf>,
        hooks: &HookSettings,
    ) -> Result<UninstallReport> {
        self.check_preconditions(root, index_dir)?;
        let archive = self.archive()?;

        self.run_pre_hook(&archive, root, HookPhase::PreUninstall, hooks)?;
        let report = self.uninstall(None, root, index_dir, exclusions)?;
        self.run_post_hook(&archive, root, HookPhase::PostUninstall, hooks)?;

        if self.unfollow(index_dir) {
            info!("The package {} has been uninstalled", self.name);
        } else {
            warn!(
                "The package {} appears to have been uninstalled, but the package database was not updated",
                self.name
            );
        }
        Ok(report)
    }

    /// Mark the package as installed; returns whether the marker now exists
    pub fn follow(&self, index_dir: &Path) -> bool {
        let index = InstalledIndex::new(index_dir);

        match index.follow(&self.name) {
            Ok(MarkerChange::Changed) => {
                info!("You are now following {}", self.name);
                true
            }
            Ok(MarkerChange::Unchanged) => {
                info!("You are already following {}", self.name);
                true
            }
            Err(e) => {
                error!(
                    "Could not record {} in the package database: {}. Run \"touch {}\" to fix it manually",
                    self.name,
                    e,
                    index.marker_path(&self.name).display()
                );
                index.is_followed(&self.name)
            }
        }
    }

    /// Mark the package as not installed; returns whether the marker is gone
    pub fn unfollow(&self, index_dir: &Path) -> bool {
        let index = InstalledIndex::new(index_dir);

        match index.unfollow(&self.name) {
            Ok(MarkerChange::Changed) => {
                info!("You are no longer following {}", self.name);
                true
            }
            Ok(MarkerChange::Unchanged) => {
                info!("You were not following {}", self.name);
                true
            }
            Err(e) => {
                error!(
                    "Could not remove {} from the package database: {}. Run \"rm {}\" to fix it manually",
                    self.name,
                    e,
                    index.marker_path(&self.name).display()
                );
                !index.is_followed(&self.name)
            }
        }
    }

    fn run_hook_in(
        &self,
        archive: &dyn ArchiveReader,
        root: &Path,
        phase: HookPhase,
        hooks: &HookSettings,
    ) -> Result<HookOutcome> {
        let guard = WorkingDirGuard::enter(root)?;
        let outcome = run_hook(archive, &self.name, phase, hooks);
        guard.restore()?;
        outcome
    }

    fn run_pre_hook(
        &self,
        archive: &dyn ArchiveReader,
        root: &Path,
        phase: HookPhase,
        hooks: &HookSettings,
    ) -> Result<()> {
        let outcome = self.run_hook_in(archive, root, phase, hooks)?;
        if outcome.succeeded() {
            return Ok(());
        }

        Err(Error::HookScript {
            package: self.name.clone(),
            script: phase.script_name(),
            reason: format!("exited with status {}", outcome.code()),
        })
    }

    /// Post hooks cannot undo what already happened, so failures only log
    fn run_post_hook(
        &self,
        archive: &dyn ArchiveReader,
        root: &Path,
        phase: HookPhase,
        hooks: &HookSettings,
    ) -> Result<()> {
        match self.run_hook_in(archive, root, phase, hooks) {
            Ok(outcome) if !outcome.succeeded() => {
                error!(
                    "The {} script for {} exited with status {}, continuing",
                    phase.as_str(),
                    self.name,
                    outcome.code()
                );
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!("{}, continuing", e),
        }
        Ok(())
    }
}

fn with_hook_scripts(exclusions: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    let mut all = exclusions.clone();
    all.extend(HookPhase::ALL.iter().map(|p| PathBuf::from(p.script_name())));
    all
}

fn is_excluded(exclusions: &BTreeSet<PathBuf>, rel: &Path, dest: &Path) -> bool {
    exclusions.contains(rel) || exclusions.contains(dest)
}

fn remove_path(path: &Path) -> io::Result<Removal> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Missing),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        if fs::read_dir(path)?.next().is_some() {
            return Ok(Removal::NonEmptyDir);
        }
        fs::remove_dir(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(Removal::Removed)
}
