// src/options/layers.rs

//! Reading the global and user config files

use super::{OptionField, Options};
use crate::config::ConfigMap;
use crate::error::Result;
use std::path::Path;
use tracing::{debug, warn};

impl Options {
    /// Read the global and user config files and apply them
    ///
    /// The user config overrides the global config, and neither overrides a
    /// command-line flag. A config file given on the command line must be
    /// readable; a missing or unreadable default file is skipped.
    ///
    /// Returns the merged mapping that was applied.
    pub fn load_config_layers(&mut self) -> Result<ConfigMap> {
        let mut merged = ConfigMap::new();

        let global_path = self.global_config_path().to_path_buf();
        if let Some(global) =
            self.read_layer(&global_path, OptionField::GlobalConfigPath)?
        {
            merged.merge_from(&global);

            // The global config may point at the user config
            if !self.cli_mask().contains(OptionField::UserConfigPath) {
                if let Some(user_path) = merged.get("userConfigPath") {
                    if let Err(e) = self.set_user_config_path(user_path) {
                        warn!("Ignoring userConfigPath from {}: {}", global_path.display(), e);
                    }
                }
            }
        }

        let user_path = self.user_config_path().to_path_buf();
        if let Some(user) = self.read_layer(&user_path, OptionField::UserConfigPath)? {
            merged.merge_from(&user);
        }

        self.apply_config(&merged)?;
        Ok(merged)
    }

    fn read_layer(&self, path: &Path, field: OptionField) -> Result<Option<ConfigMap>> {
        let explicit = self.cli_mask().contains(field);

        if !explicit && !path.exists() {
            debug!("No config file at {}, skipping", path.display());
            return Ok(None);
        }

        match ConfigMap::load(path) {
            Ok(map) => {
                debug!("Read {} option(s) from {}", map.len(), path.display());
                Ok(Some(map))
            }
            Err(e) if !explicit => {
                warn!("{}; continuing without it", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
