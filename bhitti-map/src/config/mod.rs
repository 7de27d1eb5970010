//! Configuration for the bhitti map accumulator.
//!
//! Loads all configuration from a single YAML file with sensible defaults.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bhitti_map::config::BhittiConfig;
//!
//! // Load from default path (configs/bhitti.yaml), or built-in defaults
//! let config = BhittiConfig::load_default()?;
//!
//! let settings = SettingsHandle::new(config.scan.clone())?;
//! let session = MapSession::new(&config)?;
//! ```
//!
//! ## Configuration Sections
//!
//! | Section | Description |
//! |---------|-------------|
//! | [`ScanSettings`] | Confidence threshold, vertical band, map overlay |
//! | [`MapsSection`] | Raw and partial [`MapPolicy`] |
//! | [`PersistenceSection`] | Storage directory |
//!
//! ## Example YAML
//!
//! ```yaml
//! scan:
//!   min_confidence: 0.45
//!   vertical_band:
//!     radius: 0.15
//!     height_offset: 0.0
//!   map_scale: 100.0
//!
//! maps:
//!   partial:
//!     name: partial
//!     max_points: 20000
//!     resolution: 0.05
//!     eviction: oldest_first
//!     reset_on_tracking_loss: true
//!     update_mode: blocking
//!     artifact: partial
//!
//! persistence:
//!   dir: ./maps
//! ```

mod bhitti;
mod defaults;
mod error;
mod persistence;
mod policy;
mod settings;

pub use bhitti::{BhittiConfig, DEFAULT_CONFIG_PATH, MapsSection};
pub use error::{ConfigLoadError, SettingsError};
pub use persistence::PersistenceSection;
pub use policy::{EvictionPolicy, MAX_RESOLUTION, MIN_RESOLUTION, MapPolicy, UpdateMode};
pub use settings::{
    MAX_HEIGHT_OFFSET, MAX_MAP_SCALE, MAX_POINT_LIMIT, MAX_VERTICAL_RADIUS, MIN_MAP_SCALE,
    ScanSettings, SettingsHandle, SettingsReader, VerticalBand,
};
