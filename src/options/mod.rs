// src/options/mod.rs

//! Runtime options and their resolution
//!
//! Options are resolved once at startup, lowest to highest precedence:
//! built-in defaults, the global config file, the user config file, and
//! finally command-line flags. Command-line flags are applied first and
//! recorded in an [`OptionMask`]; config files are applied afterwards and
//! skip every masked field.
//!
//! Every setter validates its candidate value and leaves the previous value
//! untouched when validation fails.

mod layers;
mod mask;
mod mode;

pub use mask::{MASK_SIZE, OptionField, OptionMask};
pub use mode::Mode;

use crate::config::ConfigMap;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Highest supported verbosity level
pub const MAX_VERBOSITY: u8 = 4;

pub const DEFAULT_VERBOSITY: u8 = 2;
pub const DEFAULT_SMART_OP: bool = true;
pub const DEFAULT_GLOBAL_CONFIG_PATH: &str = "/etc/pkg-mgr.conf";
/// Relative to the user's home directory
pub const DEFAULT_USER_CONFIG_PATH: &str = ".config/pkg-mgr.conf";
pub const DEFAULT_SYSTEM_ROOT: &str = "/";
pub const DEFAULT_PACKAGE_LIBRARY_PATH: &str = "/var/lib/pkg-mgr/pkgs/";
pub const DEFAULT_INSTALLED_PKG_PATH: &str = "/var/lib/pkg-mgr/installed/";

/// Option values taken from the command line
///
/// `None` means the flag was not given.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mode: Option<String>,
    pub verbosity: Option<u8>,
    pub global_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub system_root: Option<PathBuf>,
    pub package_library_path: Option<PathBuf>,
    pub installed_pkg_path: Option<PathBuf>,
    pub keep_hook_dirs: bool,
}

/// Resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Options {
    mode: Mode,
    verbosity: u8,
    smart_operation: bool,
    global_config_path: PathBuf,
    user_config_path: PathBuf,
    system_root: PathBuf,
    package_library_path: PathBuf,
    installed_pkg_path: PathBuf,
    excluded_files: BTreeSet<PathBuf>,
    keep_hook_dirs: bool,
    cli_mask: OptionMask,
}

impl Default for Options {
    fn default() -> Self {
        let user_config_path = match dirs::home_dir() {
            Some(home) => home.join(DEFAULT_USER_CONFIG_PATH),
            None => PathBuf::from(DEFAULT_USER_CONFIG_PATH),
        };

        Self {
            mode: Mode::NoOp,
            verbosity: DEFAULT_VERBOSITY,
            smart_operation: DEFAULT_SMART_OP,
            global_config_path: PathBuf::from(DEFAULT_GLOBAL_CONFIG_PATH),
            user_config_path,
            system_root: PathBuf::from(DEFAULT_SYSTEM_ROOT),
            package_library_path: PathBuf::from(DEFAULT_PACKAGE_LIBRARY_PATH),
            installed_pkg_path: PathBuf::from(DEFAULT_INSTALLED_PKG_PATH),
            excluded_files: BTreeSet::new(),
            keep_hook_dirs: false,
            cli_mask: OptionMask::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn smart_operation(&self) -> bool {
        self.smart_operation
    }

    pub fn global_config_path(&self) -> &Path {
        &self.global_config_path
    }

    pub fn user_config_path(&self) -> &Path {
        &self.user_config_path
    }

    pub fn system_root(&self) -> &Path {
        &self.system_root
    }

    pub fn package_library_path(&self) -> &Path {
        &self.package_library_path
    }

    pub fn installed_pkg_path(&self) -> &Path {
        &self.installed_pkg_path
    }

    pub fn excluded_files(&self) -> &BTreeSet<PathBuf> {
        &self.excluded_files
    }

    pub fn keep_hook_dirs(&self) -> bool {
        self.keep_hook_dirs
    }

    /// Fields that were given on the command line
    pub fn cli_mask(&self) -> OptionMask {
        self.cli_mask
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Set the mode from a label or short alias
    pub fn set_mode_label(&mut self, label: &str) -> Result<()> {
        let mode = Mode::from_label(label).ok_or_else(|| {
            Error::validation(
                "mode",
                format!(
                    "'{}' is not one of {}",
                    label,
                    Mode::labels().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;
        self.mode = mode;
        Ok(())
    }

    /// Set the mode from an index/label pair, rejecting mismatches
    pub fn set_mode_pair(&mut self, index: u32, label: &str) -> Result<()> {
        let mode = Mode::from_pair(index, label).ok_or_else(|| {
            Error::validation("mode", format!("no mode {} labelled '{}'", index, label))
        })?;
        self.mode = mode;
        Ok(())
    }

    pub fn set_verbosity(&mut self, level: u8) -> Result<()> {
        if level > MAX_VERBOSITY {
            return Err(Error::validation(
                "verbosity",
                format!("{} is not between 0 and {}", level, MAX_VERBOSITY),
            ));
        }
        self.verbosity = level;
        Ok(())
    }

    /// Set verbosity from its textual form, as found in config files
    pub fn set_verbosity_str(&mut self, level: &str) -> Result<()> {
        let parsed: i64 = level.trim().parse().map_err(|_| {
            Error::validation(
                "verbosity",
                format!("'{}' is not an integer between 0 and {}", level, MAX_VERBOSITY),
            )
        })?;

        let level = u8::try_from(parsed).map_err(|_| {
            Error::validation(
                "verbosity",
                format!("{} is not between 0 and {}", parsed, MAX_VERBOSITY),
            )
        })?;

        self.set_verbosity(level)
    }

    pub fn set_smart_operation(&mut self, smart_operation: bool) {
        self.smart_operation = smart_operation;
    }

    pub fn set_global_config_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute("global config path", path.as_ref())?;
        if !path.exists() {
            return Err(Error::validation(
                "global config path",
                format!("{} does not exist", path.display()),
            ));
        }
        self.global_config_path = path;
        Ok(())
    }

    /// Relative user config paths are taken relative to the home directory
    pub fn set_user_config_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let path = if path.is_relative() {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::validation("user config path", "home directory could not be determined")
            })?;
            home.join(path)
        } else {
            path.to_path_buf()
        };

        if !path.exists() {
            return Err(Error::validation(
                "user config path",
                format!("{} does not exist", path.display()),
            ));
        }
        self.user_config_path = path;
        Ok(())
    }

    pub fn set_system_root(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute("system root", path.as_ref())?;
        if !path.is_dir() {
            return Err(Error::validation(
                "system root",
                format!("{} does not exist or is not a directory", path.display()),
            ));
        }
        self.system_root = path;
        Ok(())
    }

    pub fn set_package_library_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute("package library", path.as_ref())?;
        if !path.exists() {
            return Err(Error::validation(
                "package library",
                format!("{} does not exist", path.display()),
            ));
        }
        self.package_library_path = path;
        Ok(())
    }

    pub fn set_installed_pkg_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute("installed package index", path.as_ref())?;
        if !path.exists() {
            return Err(Error::validation(
                "installed package index",
                format!("{} does not exist", path.display()),
            ));
        }
        self.installed_pkg_path = path;
        Ok(())
    }

    pub fn set_excluded_files(&mut self, excluded: BTreeSet<PathBuf>) {
        self.excluded_files = excluded;
    }

    pub fn add_to_excluded_files(&mut self, path: impl Into<PathBuf>) {
        self.excluded_files.insert(path.into());
    }

    pub fn set_keep_hook_dirs(&mut self, keep: bool) {
        self.keep_hook_dirs = keep;
    }

    /// Replace the whole mask; bits outside the known fields are rejected
    pub fn set_opt_mask(&mut self, bits: u32) -> Result<()> {
        self.cli_mask = OptionMask::from_bits(bits)?;
        Ok(())
    }

    /// OR a single field bit into the mask
    pub fn add_to_opt_mask(&mut self, bit: u32) -> Result<()> {
        self.cli_mask.add_bit(bit)
    }

    /// Apply command-line flags, marking each given field in the mask
    pub fn apply_cli(&mut self, cli: &CliOverrides) -> Result<()> {
        if let Some(level) = cli.verbosity {
            self.set_verbosity(level)?;
            self.cli_mask.insert(OptionField::Verbosity);
        }
        if let Some(mode) = &cli.mode {
            self.set_mode_label(mode)?;
            self.cli_mask.insert(OptionField::Mode);
        }
        if let Some(path) = &cli.global_config_path {
            self.set_global_config_path(path)?;
            self.cli_mask.insert(OptionField::GlobalConfigPath);
        }
        if let Some(path) = &cli.user_config_path {
            self.set_user_config_path(path)?;
            self.cli_mask.insert(OptionField::UserConfigPath);
        }
        if let Some(path) = &cli.system_root {
            self.set_system_root(path)?;
            self.cli_mask.insert(OptionField::SystemRoot);
        }
        if let Some(path) = &cli.package_library_path {
            self.set_package_library_path(path)?;
            self.cli_mask.insert(OptionField::PackageLibraryPath);
        }
        if let Some(path) = &cli.installed_pkg_path {
            self.set_installed_pkg_path(path)?;
            self.cli_mask.insert(OptionField::InstalledPkgPath);
        }
        if cli.keep_hook_dirs {
            self.set_keep_hook_dirs(true);
            self.cli_mask.insert(OptionField::KeepHookDirs);
        }
        Ok(())
    }

    /// Apply a config mapping beneath the command-line flags
    ///
    /// Keys whose field is in the CLI mask are discarded. Unknown keys are
    /// warned about and skipped. The first failing setter aborts the merge;
    /// values applied before it are kept.
    pub fn apply_config(&mut self, config: &ConfigMap) -> Result<()> {
        for (key, value) in config.iter() {
            let Some(field) = OptionField::from_config_key(key) else {
                warn!("Unrecognized configuration option {}, ignoring", key);
                continue;
            };

            if self.cli_mask.contains(field) {
                debug!("{} was given on the command line, ignoring config value", key);
                continue;
            }

            self.apply_config_value(field, key, value)?;
        }
        Ok(())
    }

    fn apply_config_value(&mut self, field: OptionField, key: &str, value: &str) -> Result<()> {
        match field {
            OptionField::Verbosity => self.set_verbosity_str(value),
            OptionField::SystemRoot => self.set_system_root(value),
            OptionField::PackageLibraryPath => self.set_package_library_path(value),
            OptionField::InstalledPkgPath => self.set_installed_pkg_path(value),
            OptionField::KeepHookDirs => {
                let keep = parse_bool(value).ok_or_else(|| {
                    Error::validation("keepHookDirs", format!("'{}' is not a boolean", value))
                })?;
                self.set_keep_hook_dirs(keep);
                Ok(())
            }
            OptionField::GlobalConfigPath | OptionField::UserConfigPath => {
                debug!("{} only takes effect before config files are read, ignoring", key);
                Ok(())
            }
            OptionField::SmartOperation | OptionField::ExcludedFiles => {
                warn!("{} is not yet implemented, ignoring", key);
                Ok(())
            }
            OptionField::Mode => {
                warn!("The mode of operation cannot be set from a config file");
                Ok(())
            }
        }
    }
}

fn absolute(option: &'static str, path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| Error::validation(option, format!("{}: {}", path.display(), e)))
}

/// Log filter directive for a verbosity level
///
/// 0 is silent, 1 warnings and errors, 2 adds informational messages, 3
/// operation tracing, 4 everything including raw OS error numbers.
pub fn log_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "off",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let opts = Options::new();
        assert_eq!(opts.mode(), Mode::NoOp);
        assert_eq!(opts.verbosity(), DEFAULT_VERBOSITY);
        assert_eq!(opts.system_root(), Path::new("/"));
        assert_eq!(opts.cli_mask().bits(), 0);
        assert!(!opts.keep_hook_dirs());
    }

    #[test]
    fn test_inert_option_setters() {
        let mut opts = Options::new();
        assert!(opts.smart_operation());
        opts.set_smart_operation(false);
        assert!(!opts.smart_operation());

        opts.add_to_excluded_files("/etc/passwd");
        opts.add_to_excluded_files("/etc/shadow");
        assert!(opts.excluded_files().contains(Path::new("/etc/passwd")));
        assert_eq!(opts.excluded_files().len(), 2);

        opts.set_excluded_files(BTreeSet::new());
        assert!(opts.excluded_files().is_empty());
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(0), "off");
        assert_eq!(log_directive(DEFAULT_VERBOSITY), "info");
        assert_eq!(log_directive(MAX_VERBOSITY), "trace");
    }

    #[test]
    fn test_verbosity_range() {
        let mut opts = Options::new();
        assert!(opts.set_verbosity(4).is_ok());
        assert!(opts.set_verbosity(5).is_err());
        assert_eq!(opts.verbosity(), 4);

        assert!(opts.set_verbosity_str("-1").is_err());
        assert!(opts.set_verbosity_str("five").is_err());
        assert_eq!(opts.verbosity(), 4);

        assert!(opts.set_verbosity_str("0").is_ok());
        assert_eq!(opts.verbosity(), 0);
    }

    #[test]
    fn test_mode_setters() {
        let mut opts = Options::new();
        opts.set_mode_label("uf").unwrap();
        assert_eq!(opts.mode(), Mode::Unfollow);

        assert!(opts.set_mode_label("bogus").is_err());
        assert_eq!(opts.mode(), Mode::Unfollow);

        assert!(opts.set_mode_pair(0, "uninstall").is_err());
        assert_eq!(opts.mode(), Mode::Unfollow);
        opts.set_mode_pair(0, "install").unwrap();
        assert_eq!(opts.mode(), Mode::Install);
    }

    #[test]
    fn test_system_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();

        let mut opts = Options::new();
        assert!(opts.set_system_root(&file).is_err());
        assert!(opts.set_system_root(dir.path().join("missing")).is_err());
        assert_eq!(opts.system_root(), Path::new("/"));

        opts.set_system_root(dir.path()).unwrap();
        assert_eq!(opts.system_root(), dir.path());
    }

    #[test]
    fn test_path_setters_require_existence() {
        let dir = tempdir().unwrap();
        let mut opts = Options::new();

        assert!(opts.set_package_library_path(dir.path().join("nope")).is_err());
        assert!(opts.set_installed_pkg_path(dir.path().join("nope")).is_err());
        assert!(opts.set_global_config_path(dir.path().join("nope.conf")).is_err());

        opts.set_package_library_path(dir.path()).unwrap();
        opts.set_installed_pkg_path(dir.path()).unwrap();
        assert_eq!(opts.package_library_path(), dir.path());
        assert_eq!(opts.installed_pkg_path(), dir.path());
    }

    #[test]
    fn test_user_config_path_absolute() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("user.conf");
        std::fs::write(&conf, b"verbosity=1\n").unwrap();

        let mut opts = Options::new();
        opts.set_user_config_path(&conf).unwrap();
        assert_eq!(opts.user_config_path(), conf.as_path());
    }

    #[test]
    fn test_opt_mask_setters() {
        let mut opts = Options::new();
        assert!(opts.add_to_opt_mask(3).is_err());
        opts.add_to_opt_mask(OptionField::SystemRoot.bit()).unwrap();
        opts.add_to_opt_mask(OptionField::Verbosity.bit()).unwrap();
        assert_eq!(opts.cli_mask().bits(), 33);

        assert!(opts.set_opt_mask(1 << MASK_SIZE).is_err());
        assert_eq!(opts.cli_mask().bits(), 33);
        opts.set_opt_mask(0).unwrap();
        assert_eq!(opts.cli_mask().bits(), 0);
    }

    #[test]
    fn test_apply_config_respects_cli_mask() {
        let cli_root = tempdir().unwrap();
        let config_root = tempdir().unwrap();

        let mut opts = Options::new();
        opts.apply_cli(&CliOverrides {
            system_root: Some(cli_root.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let config: ConfigMap = [("systemRoot", config_root.path().to_str().unwrap())]
            .into_iter()
            .collect();
        opts.apply_config(&config).unwrap();
        assert_eq!(opts.system_root(), cli_root.path());
    }

    #[test]
    fn test_apply_config_sets_unmasked_fields() {
        let config_root = tempdir().unwrap();

        let mut opts = Options::new();
        let config: ConfigMap = [
            ("systemRoot", config_root.path().to_str().unwrap()),
            ("verbosity", "3"),
            ("keepHookDirs", "yes"),
        ]
        .into_iter()
        .collect();
        opts.apply_config(&config).unwrap();

        assert_eq!(opts.system_root(), config_root.path());
        assert_eq!(opts.verbosity(), 3);
        assert!(opts.keep_hook_dirs());
    }

    #[test]
    fn test_apply_config_cli_verbosity_wins() {
        let mut opts = Options::new();
        opts.apply_cli(&CliOverrides {
            verbosity: Some(0),
            ..Default::default()
        })
        .unwrap();

        let config: ConfigMap = [("verbosity", "4")].into_iter().collect();
        opts.apply_config(&config).unwrap();
        assert_eq!(opts.verbosity(), 0);
    }

    #[test]
    fn test_apply_config_unknown_and_inert_keys() {
        let mut opts = Options::new();
        let config: ConfigMap = [
            ("colour", "always"),
            ("smartOperation", "false"),
            ("excludedFiles", "/etc/passwd"),
            ("globalConfigPath", "/nonexistent"),
        ]
        .into_iter()
        .collect();

        opts.apply_config(&config).unwrap();
        assert!(opts.smart_operation());
        assert!(opts.excluded_files().is_empty());
        assert_eq!(opts.global_config_path(), Path::new(DEFAULT_GLOBAL_CONFIG_PATH));
    }

    #[test]
    fn test_apply_config_failure_keeps_partial_state() {
        let root = tempdir().unwrap();

        let mut opts = Options::new();
        // Keys are applied in sorted order: installedPkgPath, systemRoot, verbosity
        let config: ConfigMap = [
            ("installedPkgPath", root.path().to_str().unwrap()),
            ("systemRoot", "/nonexistent/root"),
            ("verbosity", "1"),
        ]
        .into_iter()
        .collect();

        assert!(opts.apply_config(&config).is_err());
        assert_eq!(opts.installed_pkg_path(), root.path());
        assert_eq!(opts.system_root(), Path::new("/"));
        assert_eq!(opts.verbosity(), DEFAULT_VERBOSITY);
    }

    #[test]
    fn test_apply_cli_invalid_mode() {
        let mut opts = Options::new();
        let result = opts.apply_cli(&CliOverrides {
            mode: Some("explode".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
        assert!(!opts.cli_mask().contains(OptionField::Mode));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
