// src/packages/hooks.rs

//! Hook scripts bundled inside package archives
//!
//! A package may carry up to four executables at fixed archive paths. Each
//! one is extracted into a directory of its own and run with the system
//! root as working directory.

use crate::archive::{ArchiveReader, Visit};
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info, trace};

/// Code reported for a hook the package does not ship (outside 0..=255)
pub const HOOK_NOT_PRESENT: i32 = 256;

/// Code reported for a hook killed by a signal
pub const HOOK_TERMINATED: i32 = -1;

/// Point in the package lifecycle at which a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
}

impl HookPhase {
    pub const ALL: [HookPhase; 4] = [
        HookPhase::PreInstall,
        HookPhase::PostInstall,
        HookPhase::PreUninstall,
        HookPhase::PostUninstall,
    ];

    /// Archive path of the script for this phase
    pub fn script_name(self) -> &'static str {
        match self {
            HookPhase::PreInstall => "pre-install.sh",
            HookPhase::PostInstall => "post-install.sh",
            HookPhase::PreUninstall => "pre-uninstall.sh",
            HookPhase::PostUninstall => "post-uninstall.sh",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::PreInstall => "pre-install",
            HookPhase::PostInstall => "post-install",
            HookPhase::PreUninstall => "pre-uninstall",
            HookPhase::PostUninstall => "post-uninstall",
        }
    }

    /// Pre-phase hooks can veto the operation
    pub fn is_pre(self) -> bool {
        matches!(self, HookPhase::PreInstall | HookPhase::PreUninstall)
    }
}

/// What happened when a hook was looked up and run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    NotPresent,
    Exited(i32),
    Terminated,
}

impl HookOutcome {
    /// Numeric form: the exit status, [`HOOK_NOT_PRESENT`] or [`HOOK_TERMINATED`]
    pub fn code(self) -> i32 {
        match self {
            HookOutcome::NotPresent => HOOK_NOT_PRESENT,
            HookOutcome::Exited(code) => code,
            HookOutcome::Terminated => HOOK_TERMINATED,
        }
    }

    /// An absent hook counts as success
    pub fn succeeded(self) -> bool {
        matches!(self, HookOutcome::NotPresent | HookOutcome::Exited(0))
    }
}

/// Where hook scripts are extracted and whether they are kept afterwards
#[derive(Debug, Clone)]
pub struct HookSettings {
    pub temp_dir: PathBuf,
    pub keep_dirs: bool,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self::new(false)
    }
}

impl HookSettings {
    /// Settings extracting under the system temp directory
    pub fn new(keep_dirs: bool) -> Self {
        Self::in_dir(env::temp_dir(), keep_dirs)
    }

    /// Settings extracting under `temp_dir`
    ///
    /// A relative `temp_dir` is resolved now, before any hook run moves the
    /// working directory to the system root.
    pub fn in_dir(temp_dir: impl AsRef<Path>, keep_dirs: bool) -> Self {
        let temp_dir = temp_dir.as_ref();
        let temp_dir = std::path::absolute(temp_dir).unwrap_or_else(|_| temp_dir.to_path_buf());
        Self {
            temp_dir,
            keep_dirs,
        }
    }

    /// The retained extraction directory for one package and phase
    pub fn kept_dir(&self, package: &str, phase: HookPhase) -> PathBuf {
        self.temp_dir.join(format!("{}-{}", package, phase.as_str()))
    }
}

/// A hook extraction directory, removed on drop unless kept
enum HookDir {
    Temporary(tempfile::TempDir),
    Kept(PathBuf),
}

impl HookDir {
    fn create(settings: &HookSettings, package: &str, phase: HookPhase) -> Result<Self> {
        if settings.keep_dirs {
            let dir = settings.kept_dir(package, phase);
            fs::create_dir_all(&dir)?;
            return Ok(HookDir::Kept(dir));
        }

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", package, phase.as_str()))
            .tempdir_in(&settings.temp_dir)?;
        Ok(HookDir::Temporary(dir))
    }

    fn path(&self) -> &Path {
        match self {
            HookDir::Temporary(dir) => dir.path(),
            HookDir::Kept(dir) => dir,
        }
    }
}

/// Extract and run the hook for `phase`, if the archive ships one
///
/// The script runs in the current working directory; callers enter the
/// system root first with [`WorkingDirGuard`].
pub fn run_hook(
    archive: &dyn ArchiveReader,
    package: &str,
    phase: HookPhase,
    settings: &HookSettings,
) -> Result<HookOutcome> {
    let script = Path::new(phase.script_name());
    let mut extracted: Option<(HookDir, PathBuf)> = None;

    archive.scan(&mut |entry| {
        if entry.header().path != script {
            return Ok(Visit::Continue);
        }

        let dir = HookDir::create(settings, package, phase)?;
        let dest = dir.path().join(script);
        entry.extract_to(&dest)?;
        extracted = Some((dir, dest));
        Ok(Visit::Stop)
    })?;

    let Some((dir, script_path)) = extracted else {
        trace!("No {} script in {}", phase.as_str(), package);
        return Ok(HookOutcome::NotPresent);
    };

    debug!("Running {} script {}", phase.as_str(), script_path.display());
    let status = Command::new(&script_path).status().map_err(|e| Error::HookScript {
        package: package.to_string(),
        script: phase.script_name(),
        reason: format!("could not be executed: {}", e),
    })?;

    if let HookDir::Kept(path) = &dir {
        info!("Kept {} script directory {}", phase.as_str(), path.display());
    }

    let outcome = match status.code() {
        Some(code) => HookOutcome::Exited(code),
        None => HookOutcome::Terminated,
    };
    debug!("{} script for {} finished: {:?}", phase.as_str(), package, outcome);
    Ok(outcome)
}

/// Changes the process working directory and changes it back on drop
///
/// The working directory is process-global, so every exit path out of a
/// hook run must pass through the restore.
pub struct WorkingDirGuard {
    previous: Option<PathBuf>,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = env::current_dir().map_err(|source| Error::WorkingDirectory {
            path: PathBuf::from("."),
            source,
        })?;

        env::set_current_dir(dir).map_err(|source| Error::WorkingDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        trace!("Entered {}", dir.display());

        Ok(Self {
            previous: Some(previous),
        })
    }

    /// Restore the previous working directory, reporting failure
    pub fn restore(mut self) -> Result<()> {
        match self.previous.take() {
            Some(previous) => restore_dir(&previous),
            None => Ok(()),
        }
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = restore_dir(&previous) {
                error!("{}", e);
            }
        }
    }
}

fn restore_dir(previous: &Path) -> Result<()> {
    env::set_current_dir(previous).map_err(|source| Error::WorkingDirectory {
        path: previous.to_path_buf(),
        source,
    })?;
    trace!("Returned to {}", previous.display());
    Ok(())
}
