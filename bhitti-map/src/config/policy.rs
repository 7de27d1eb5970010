//! Per-store map policy.
//!
//! The raw and partial maps share one [`SpatialMap`](crate::map::SpatialMap)
//! implementation and differ only in the [`MapPolicy`] they are built with.

use serde::{Deserialize, Serialize};

use super::error::{SettingsError, check_count, check_range};
use super::settings::MAX_POINT_LIMIT;

/// Finest accepted grid resolution (meters)
pub const MIN_RESOLUTION: f32 = 1e-4;
/// Coarsest accepted grid resolution (meters)
pub const MAX_RESOLUTION: f32 = 1.0;

/// Which point leaves the map when it is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the point whose observation is oldest
    #[default]
    OldestFirst,
    /// Evict the least confident point (oldest among equals)
    LowestConfidenceFirst,
}

impl EvictionPolicy {
    /// Stable on-disk code
    pub fn code(self) -> u8 {
        match self {
            EvictionPolicy::OldestFirst => 0,
            EvictionPolicy::LowestConfidenceFirst => 1,
        }
    }

    /// Decode an on-disk code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EvictionPolicy::OldestFirst),
            1 => Some(EvictionPolicy::LowestConfidenceFirst),
            _ => None,
        }
    }
}

/// How the render loop feeds a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Insert on the calling thread before the frame is drawn
    #[default]
    Blocking,
    /// Hand the frame to the store's background updater
    Background,
}

/// Configuration of one map store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapPolicy {
    /// Human-readable store name (used in logs)
    pub name: String,

    /// Maximum stored point count
    pub max_points: usize,

    /// Grid cell size (meters) used for deduplication
    pub resolution: f32,

    /// Eviction strategy when full
    pub eviction: EvictionPolicy,

    /// Clear the map when tracking is lost
    pub reset_on_tracking_loss: bool,

    /// Blocking or background updates
    pub update_mode: UpdateMode,

    /// Persisted artifact name (file stem)
    pub artifact: String,
}

impl Default for MapPolicy {
    fn default() -> Self {
        Self::partial()
    }
}

impl MapPolicy {
    /// Raw/full map: accumulates everything seen for later export.
    ///
    /// Large bound, fine grid, keeps the best observations, updated off the
    /// render thread, never reset automatically.
    pub fn raw() -> Self {
        Self {
            name: "raw".to_string(),
            max_points: MAX_POINT_LIMIT,
            resolution: 0.02,
            eviction: EvictionPolicy::LowestConfidenceFirst,
            reset_on_tracking_loss: false,
            update_mode: UpdateMode::Background,
            artifact: "raw".to_string(),
        }
    }

    /// Partial/session map: live on-screen feedback.
    ///
    /// Tighter bound, coarser grid, short retention, updated before each
    /// frame is drawn, reset when tracking is lost.
    pub fn partial() -> Self {
        Self {
            name: "partial".to_string(),
            max_points: 20_000,
            resolution: 0.05,
            eviction: EvictionPolicy::OldestFirst,
            reset_on_tracking_loss: true,
            update_mode: UpdateMode::Blocking,
            artifact: "partial".to_string(),
        }
    }

    /// Set the capacity
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Set the grid resolution
    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the eviction strategy
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Set the update mode
    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    /// Validate ranges and names
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_count("max_points", self.max_points, 1, MAX_POINT_LIMIT)?;
        check_range("resolution", self.resolution, MIN_RESOLUTION, MAX_RESOLUTION)?;
        if self.name.is_empty() {
            return Err(SettingsError::Invalid {
                field: "name",
                reason: "empty".to_string(),
            });
        }
        let artifact_ok = !self.artifact.is_empty()
            && self
                .artifact
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !artifact_ok {
            return Err(SettingsError::Invalid {
                field: "artifact",
                reason: format!("{:?} is not a plain file stem", self.artifact),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(MapPolicy::raw().validate().is_ok());
        assert!(MapPolicy::partial().validate().is_ok());
        assert!(MapPolicy::raw().max_points > MapPolicy::partial().max_points);
    }

    #[test]
    fn test_max_points_bounds() {
        assert!(MapPolicy::partial().with_max_points(0).validate().is_err());
        assert!(MapPolicy::partial().with_max_points(1).validate().is_ok());
        assert!(MapPolicy::partial().with_max_points(50_001).validate().is_err());
    }

    #[test]
    fn test_resolution_bounds() {
        assert!(MapPolicy::partial().with_resolution(0.0).validate().is_err());
        assert!(MapPolicy::partial().with_resolution(-0.1).validate().is_err());
        assert!(MapPolicy::partial().with_resolution(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_artifact_must_be_stem() {
        let mut policy = MapPolicy::raw();
        policy.artifact = "../escape".to_string();
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_eviction_codes() {
        for policy in [EvictionPolicy::OldestFirst, EvictionPolicy::LowestConfidenceFirst] {
            assert_eq!(EvictionPolicy::from_code(policy.code()), Some(policy));
        }
        assert_eq!(EvictionPolicy::from_code(7), None);
    }
}
