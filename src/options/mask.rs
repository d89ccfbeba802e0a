// src/options/mask.rs

//! Tracking which options were given on the command line
//!
//! Each [`OptionField`] owns one bit of an [`OptionMask`]. A field whose bit
//! is set came from the command line, and config files never override it.

use crate::error::{Error, Result};

/// Options that can be supplied on the command line or in a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionField {
    Verbosity,
    SmartOperation,
    Mode,
    GlobalConfigPath,
    UserConfigPath,
    SystemRoot,
    PackageLibraryPath,
    InstalledPkgPath,
    ExcludedFiles,
    KeepHookDirs,
}

/// Number of bits the mask uses
pub const MASK_SIZE: u32 = OptionField::ALL.len() as u32;

/// Config file keys and the fields they set
const CONFIG_KEYS: &[(&str, OptionField)] = &[
    ("verbosity", OptionField::Verbosity),
    ("smartOperation", OptionField::SmartOperation),
    ("globalConfigPath", OptionField::GlobalConfigPath),
    ("userConfigPath", OptionField::UserConfigPath),
    ("systemRoot", OptionField::SystemRoot),
    ("packageLibraryPath", OptionField::PackageLibraryPath),
    ("installedPkgPath", OptionField::InstalledPkgPath),
    ("excludedFiles", OptionField::ExcludedFiles),
    ("keepHookDirs", OptionField::KeepHookDirs),
];

impl OptionField {
    pub const ALL: [OptionField; 10] = [
        OptionField::Verbosity,
        OptionField::SmartOperation,
        OptionField::Mode,
        OptionField::GlobalConfigPath,
        OptionField::UserConfigPath,
        OptionField::SystemRoot,
        OptionField::PackageLibraryPath,
        OptionField::InstalledPkgPath,
        OptionField::ExcludedFiles,
        OptionField::KeepHookDirs,
    ];

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.bit() == bit)
    }

    /// The config file key for this field, if it has one
    pub fn config_key(self) -> Option<&'static str> {
        CONFIG_KEYS
            .iter()
            .find(|(_, field)| *field == self)
            .map(|(key, _)| *key)
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        CONFIG_KEYS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, field)| *field)
    }
}

/// Set of fields supplied on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionMask(u32);

impl OptionMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mask from raw bits; every bit must belong to a known field
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits >> MASK_SIZE != 0 {
            return Err(Error::validation(
                "option mask",
                format!("{:#x} uses more than {} bits", bits, MASK_SIZE),
            ));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, field: OptionField) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn insert(&mut self, field: OptionField) {
        self.0 |= field.bit();
    }

    /// OR a single raw bit into the mask
    ///
    /// Rejects anything that is not exactly one bit of a known field; the
    /// mask is left unchanged in that case.
    pub fn add_bit(&mut self, bit: u32) -> Result<()> {
        match OptionField::from_bit(bit) {
            Some(field) => {
                self.insert(field);
                Ok(())
            }
            None => Err(Error::validation(
                "option mask",
                format!("{} is not a single option bit", bit),
            )),
        }
    }

    pub fn fields(self) -> impl Iterator<Item = OptionField> {
        OptionField::ALL
            .into_iter()
            .filter(move |field| self.contains(*field))
    }
}
