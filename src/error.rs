// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for pkg-mgr
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A candidate option value failed validation; the previous value is kept
    #[error("Invalid value for {option}: {reason}")]
    Validation { option: &'static str, reason: String },

    /// A line-oriented source (usually a config file) could not be read
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening, reading, or extracting an archive failed
    #[error("Archive error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// A required directory or file for an install/uninstall is missing
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A hook script could not be run or exited unsuccessfully
    #[error("Hook script {script} for package {package} failed: {reason}")]
    HookScript {
        package: String,
        script: &'static str,
        reason: String,
    },

    /// Entering or restoring the working directory failed
    #[error("Could not change working directory to {}: {source}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Named package archive does not exist
    #[error("Package not found: {}", .0.display())]
    PackageNotFound(PathBuf),
}

impl Error {
    pub(crate) fn validation(option: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            option,
            reason: reason.into(),
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Fatal errors abort the whole invocation rather than just one package
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Precondition(_) | Error::WorkingDirectory { .. })
    }
}

/// Result type alias using pkg-mgr's Error type
pub type Result<T> = std::result::Result<T, Error>;
