// src/options/mode.rs

//! Modes of operation

use std::fmt;
use std::str::FromStr;

/// The single operation selected for an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Install,
    Uninstall,
    Follow,
    Unfollow,
    ListAll,
    ListInstalled,
    NoOp,
}

/// Mode, numeric index, canonical label, short alias
const MODES: &[(Mode, u32, &str, &str)] = &[
    (Mode::Install, 0, "install", "i"),
    (Mode::Uninstall, 1, "uninstall", "u"),
    (Mode::Follow, 2, "follow", "f"),
    (Mode::Unfollow, 3, "unfollow", "uf"),
    (Mode::ListAll, 4, "list-all", "la"),
    (Mode::ListInstalled, 5, "list-installed", "li"),
    (Mode::NoOp, 99, "none", "none"),
];

impl Mode {
    fn entry(self) -> &'static (Mode, u32, &'static str, &'static str) {
        match self {
            Mode::Install => &MODES[0],
            Mode::Uninstall => &MODES[1],
            Mode::Follow => &MODES[2],
            Mode::Unfollow => &MODES[3],
            Mode::ListAll => &MODES[4],
            Mode::ListInstalled => &MODES[5],
            Mode::NoOp => &MODES[6],
        }
    }

    pub fn index(self) -> u32 {
        self.entry().1
    }

    pub fn as_str(self) -> &'static str {
        self.entry().2
    }

    pub fn alias(self) -> &'static str {
        self.entry().3
    }

    pub fn from_index(index: u32) -> Option<Self> {
        MODES
            .iter()
            .find(|(_, i, ..)| *i == index)
            .map(|(mode, ..)| *mode)
    }

    /// Look up a selectable mode by label or alias
    pub fn from_label(label: &str) -> Option<Self> {
        MODES
            .iter()
            .filter(|(mode, ..)| *mode != Mode::NoOp)
            .find(|(_, _, canonical, alias)| *canonical == label || *alias == label)
            .map(|(mode, ..)| *mode)
    }

    /// Look up a mode by index, requiring that `label` is its canonical label
    pub fn from_pair(index: u32, label: &str) -> Option<Self> {
        Self::from_index(index).filter(|mode| mode.as_str() == label)
    }

    /// List modes take no package arguments
    pub fn is_list(self) -> bool {
        matches!(self, Mode::ListAll | Mode::ListInstalled)
    }

    /// Labels accepted on the command line, for help text
    pub fn labels() -> impl Iterator<Item = &'static str> {
        MODES
            .iter()
            .filter(|(mode, ..)| *mode != Mode::NoOp)
            .map(|(_, _, label, _)| *label)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::from_label(s).ok_or_else(|| format!("Invalid mode of operation: {}", s))
    }
}
