//! Persistence configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Persistence settings section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistenceSection {
    /// Directory holding the saved map artifacts
    #[serde(default = "defaults::maps_dir")]
    pub dir: String,

    /// Load saved maps when the session starts
    #[serde(default = "defaults::enabled")]
    pub load_on_start: bool,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            dir: defaults::maps_dir(),
            load_on_start: true,
        }
    }
}

impl PersistenceSection {
    /// Storage directory as a path
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}
