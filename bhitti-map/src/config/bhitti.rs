//! Main BhittiConfig and conversion methods.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::defaults;
use super::error::ConfigLoadError;
use super::persistence::PersistenceSection;
use super::policy::MapPolicy;
use super::settings::ScanSettings;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "configs/bhitti.yaml";

/// Policies for the two map stores
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapsSection {
    /// Raw/full accumulation map
    #[serde(default = "defaults::raw_policy")]
    pub raw: MapPolicy,

    /// Partial/session map
    #[serde(default = "defaults::partial_policy")]
    pub partial: MapPolicy,
}

impl Default for MapsSection {
    fn default() -> Self {
        Self {
            raw: MapPolicy::raw(),
            partial: MapPolicy::partial(),
        }
    }
}

/// Full configuration loaded from YAML
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct BhittiConfig {
    /// Scan filter and display settings
    #[serde(default)]
    pub scan: ScanSettings,

    /// Map store policies
    #[serde(default)]
    pub maps: MapsSection,

    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceSection,
}

impl BhittiConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Load from the default config path, falling back to built-in defaults
    pub fn load_default() -> Result<Self, ConfigLoadError> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {}, using defaults", DEFAULT_CONFIG_PATH);
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigLoadError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        serde_yaml::to_string(self).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.scan.validate()?;
        self.maps.raw.validate()?;
        self.maps.partial.validate()?;
        if self.maps.raw.artifact == self.maps.partial.artifact {
            return Err(ConfigLoadError::Invalid(
                super::error::SettingsError::Invalid {
                    field: "artifact",
                    reason: "raw and partial maps must persist to different artifacts"
                        .to_string(),
                },
            ));
        }
        Ok(())
    }
}
