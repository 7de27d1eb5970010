//! Confidence and vertical-band gating for raw depth samples.
//!
//! Works on camera-local samples, before the pose is applied.

use crate::config::{ScanSettings, VerticalBand};
use crate::core::{FrameSample, RawPoint};

/// Per-frame point filter.
///
/// Accepts a sample iff:
/// - all components are finite and confidence is in [0, 1]
/// - confidence is at least `min_confidence`
/// - the vertical band is disabled, or `|y - height_offset| <= radius`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFilter {
    min_confidence: f32,
    vertical_band: Option<VerticalBand>,
}

impl PointFilter {
    /// Create a filter
    pub fn new(min_confidence: f32, vertical_band: Option<VerticalBand>) -> Self {
        Self {
            min_confidence,
            vertical_band,
        }
    }

    /// Filter configured from the current frame's settings
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self::new(settings.min_confidence, settings.vertical_band)
    }

    /// Confidence threshold
    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Check a single sample.
    #[inline]
    pub fn accepts(&self, point: &RawPoint) -> bool {
        point.is_well_formed()
            && point.confidence >= self.min_confidence
            && self
                .vertical_band
                .is_none_or(|band| band.contains(point.y))
    }

    /// Lazily filter a frame's samples.
    pub fn apply<'a>(&self, frame: &'a FrameSample) -> impl Iterator<Item = &'a RawPoint> + 'a {
        let filter = *self;
        frame.points.iter().filter(move |p| filter.accepts(p))
    }
}

impl Default for PointFilter {
    fn default() -> Self {
        Self::from_settings(&ScanSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Pose;

    fn frame(points: Vec<RawPoint>) -> FrameSample {
        FrameSample::new(1, Pose::identity(), points)
    }

    #[test]
    fn test_confidence_threshold() {
        let filter = PointFilter::new(0.45, None);
        assert!(!filter.accepts(&RawPoint::new(0.0, 0.0, -1.0, 0.44)));
        assert!(filter.accepts(&RawPoint::new(0.0, 0.0, -1.0, 0.45)));
        assert!(filter.accepts(&RawPoint::new(0.0, 0.0, -1.0, 1.0)));
    }

    #[test]
    fn test_vertical_band() {
        let filter = PointFilter::new(0.0, Some(VerticalBand::new(0.15, 0.0)));
        assert!(filter.accepts(&RawPoint::new(0.0, 0.1, -1.0, 0.5)));
        assert!(!filter.accepts(&RawPoint::new(0.0, 0.2, -1.0, 0.5)));
        assert!(filter.accepts(&RawPoint::new(0.0, -0.1, -1.0, 0.5)));
    }

    #[test]
    fn test_vertical_band_with_offset() {
        let filter = PointFilter::new(0.0, Some(VerticalBand::new(0.2, -1.0)));
        assert!(filter.accepts(&RawPoint::new(0.0, -1.1, 0.0, 0.5)));
        assert!(!filter.accepts(&RawPoint::new(0.0, -0.5, 0.0, 0.5)));
    }

    #[test]
    fn test_malformed_dropped() {
        let filter = PointFilter::new(0.0, None);
        let samples = frame(vec![
            RawPoint::new(f32::NAN, 0.0, 0.0, 0.9),
            RawPoint::new(0.0, f32::INFINITY, 0.0, 0.9),
            RawPoint::new(0.0, 0.0, 0.0, f32::NAN),
            RawPoint::new(0.0, 0.0, 0.0, 1.2),
            RawPoint::new(0.0, 0.0, 0.0, -0.1),
            RawPoint::new(1.0, 2.0, 3.0, 0.5),
        ]);
        let accepted: Vec<_> = filter.apply(&samples).collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].x, 1.0);
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = PointFilter::new(0.5, None);
        let samples = frame(vec![
            RawPoint::new(1.0, 0.0, 0.0, 0.9),
            RawPoint::new(2.0, 0.0, 0.0, 0.1),
            RawPoint::new(3.0, 0.0, 0.0, 0.6),
        ]);
        let xs: Vec<f32> = filter.apply(&samples).map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 3.0]);
    }

    #[test]
    fn test_from_settings() {
        let settings = ScanSettings::default()
            .with_min_confidence(0.7)
            .with_vertical_band(0.5, 1.0);
        let filter = PointFilter::from_settings(&settings);
        assert_eq!(filter.min_confidence(), 0.7);
        assert!(filter.accepts(&RawPoint::new(0.0, 1.4, 0.0, 0.8)));
        assert!(!filter.accepts(&RawPoint::new(0.0, 0.4, 0.0, 0.8)));
    }
}
