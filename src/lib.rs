// src/lib.rs

//! pkg-mgr: a package manager for local tar archives
//!
//! Packages are tar archives kept in a package library directory. Installing
//! one extracts it under a system root; uninstalling removes what it
//! extracted. The database of installed packages is a directory of empty
//! marker files, one per package.
//!
//! # Architecture
//!
//! - Options resolve in layers: defaults < global config < user config < CLI
//! - Archives are read sequentially through the `ArchiveReader` trait
//! - Hook scripts bundled in an archive run before and after each operation
//! - No rollback: a failed operation leaves whatever it already changed

pub mod archive;
pub mod config;
pub mod db;
mod error;
pub mod options;
pub mod packages;

pub use error::{Error, Result};
