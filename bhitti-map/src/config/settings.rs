//! Scan settings shared by the per-frame pipeline.
//!
//! [`ScanSettings`] is a plain validated value. [`SettingsHandle`] is its
//! single owner: updates go through it, are validated, and are swapped in
//! whole. The pipeline holds a [`SettingsReader`] and takes one
//! `Arc<ScanSettings>` per frame, so a frame never sees a half-applied
//! update.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::defaults;
use super::error::{SettingsError, check_count, check_range};

/// Largest accepted vertical scan radius (meters)
pub const MAX_VERTICAL_RADIUS: f32 = 1.5;
/// Height offset bound (meters, symmetric)
pub const MAX_HEIGHT_OFFSET: f32 = 3.0;
/// Map display scale range
pub const MIN_MAP_SCALE: f32 = 1.0;
/// Map display scale range
pub const MAX_MAP_SCALE: f32 = 500.0;
/// Upper bound for rendered and stored point counts
pub const MAX_POINT_LIMIT: usize = 50_000;

/// Vertical band filter around a height offset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerticalBand {
    /// Half height of the band (meters)
    pub radius: f32,
    /// Band center (meters)
    #[serde(default)]
    pub height_offset: f32,
}

impl VerticalBand {
    /// Create a band
    pub fn new(radius: f32, height_offset: f32) -> Self {
        Self {
            radius,
            height_offset,
        }
    }

    /// True if `y` lies inside the band
    #[inline]
    pub fn contains(&self, y: f32) -> bool {
        (y - self.height_offset).abs() <= self.radius
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("vertical_band.radius", self.radius, 0.0, MAX_VERTICAL_RADIUS)?;
        check_range(
            "vertical_band.height_offset",
            self.height_offset,
            -MAX_HEIGHT_OFFSET,
            MAX_HEIGHT_OFFSET,
        )
    }
}

/// Per-frame scan and display settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Samples below this confidence are discarded
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f32,

    /// Optional vertical band filter (disabled when absent)
    #[serde(default)]
    pub vertical_band: Option<VerticalBand>,

    /// Pixels per meter on the map overlay
    #[serde(default = "defaults::map_scale")]
    pub map_scale: f32,

    /// Map overlay X offset (pixels)
    #[serde(default)]
    pub map_offset_x: f32,

    /// Map overlay Y offset (pixels)
    #[serde(default)]
    pub map_offset_y: f32,

    /// Cap on points drawn by the map overlay
    #[serde(default = "defaults::max_render_points")]
    pub max_render_points: usize,

    /// Draw the camera position marker
    #[serde(default = "defaults::enabled")]
    pub marker_visible: bool,

    /// Marker size (pixels)
    #[serde(default = "defaults::marker_size")]
    pub marker_size: f32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            min_confidence: defaults::min_confidence(),
            vertical_band: None,
            map_scale: defaults::map_scale(),
            map_offset_x: 0.0,
            map_offset_y: 0.0,
            max_render_points: defaults::max_render_points(),
            marker_visible: true,
            marker_size: defaults::marker_size(),
        }
    }
}

impl ScanSettings {
    /// Set the confidence threshold
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Enable the vertical band filter
    pub fn with_vertical_band(mut self, radius: f32, height_offset: f32) -> Self {
        self.vertical_band = Some(VerticalBand::new(radius, height_offset));
        self
    }

    /// Validate every field
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("min_confidence", self.min_confidence, 0.0, 1.0)?;
        if let Some(band) = &self.vertical_band {
            band.validate()?;
        }
        check_range("map_scale", self.map_scale, MIN_MAP_SCALE, MAX_MAP_SCALE)?;
        check_range("map_offset_x", self.map_offset_x, f32::MIN, f32::MAX)?;
        check_range("map_offset_y", self.map_offset_y, f32::MIN, f32::MAX)?;
        check_count("max_render_points", self.max_render_points, 0, MAX_POINT_LIMIT)?;
        if !(self.marker_size.is_finite() && self.marker_size > 0.0) {
            return Err(SettingsError::Invalid {
                field: "marker_size",
                reason: format!("{} is not a positive size", self.marker_size),
            });
        }
        Ok(())
    }
}

/// Owner of the process-wide settings.
///
/// Only the owner can update; readers obtained from [`SettingsHandle::reader`]
/// observe whole snapshots.
#[derive(Debug)]
pub struct SettingsHandle {
    shared: Arc<RwLock<Arc<ScanSettings>>>,
}

impl SettingsHandle {
    /// Take ownership of validated settings
    pub fn new(settings: ScanSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            shared: Arc::new(RwLock::new(Arc::new(settings))),
        })
    }

    /// Read-only view for the pipeline
    pub fn reader(&self) -> SettingsReader {
        SettingsReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current settings
    pub fn current(&self) -> Arc<ScanSettings> {
        self.shared.read().clone()
    }

    /// Apply an edit. The edit is validated before it becomes visible; on
    /// error the previous settings stay in place.
    pub fn update<F>(&mut self, edit: F) -> Result<Arc<ScanSettings>, SettingsError>
    where
        F: FnOnce(&mut ScanSettings),
    {
        let mut next = (*self.current()).clone();
        edit(&mut next);
        self.replace(next)
    }

    /// Replace the settings wholesale
    pub fn replace(&mut self, settings: ScanSettings) -> Result<Arc<ScanSettings>, SettingsError> {
        settings.validate()?;
        let next = Arc::new(settings);
        *self.shared.write() = Arc::clone(&next);
        log::debug!(
            "Settings updated: min_confidence={:.2}, vertical_band={:?}",
            next.min_confidence,
            next.vertical_band
        );
        Ok(next)
    }
}

/// Cloneable read-only view of the settings.
#[derive(Clone, Debug)]
pub struct SettingsReader {
    shared: Arc<RwLock<Arc<ScanSettings>>>,
}

impl SettingsReader {
    /// Settings to use for the current frame
    pub fn current(&self) -> Arc<ScanSettings> {
        self.shared.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = ScanSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.min_confidence, 0.45);
        assert!(settings.vertical_band.is_none());
    }

    #[test]
    fn test_vertical_band_contains() {
        let band = VerticalBand::new(0.15, 0.0);
        assert!(band.contains(0.1));
        assert!(!band.contains(0.2));
        assert!(band.contains(-0.15));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(ScanSettings::default().with_min_confidence(1.2).validate().is_err());
        assert!(
            ScanSettings::default()
                .with_vertical_band(2.0, 0.0)
                .validate()
                .is_err()
        );
        assert!(
            ScanSettings::default()
                .with_vertical_band(0.5, -3.5)
                .validate()
                .is_err()
        );

        let settings = ScanSettings {
            map_scale: 0.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = ScanSettings {
            max_render_points: 60_000,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_handle_update_is_atomic() {
        let mut handle = SettingsHandle::new(ScanSettings::default()).unwrap();
        let reader = handle.reader();

        let before = reader.current();
        handle.update(|s| s.min_confidence = 0.8).unwrap();
        assert_eq!(before.min_confidence, 0.45);
        assert_eq!(reader.current().min_confidence, 0.8);

        // Invalid edit leaves the previous settings visible
        assert!(handle.update(|s| s.min_confidence = -1.0).is_err());
        assert_eq!(reader.current().min_confidence, 0.8);
    }
}
