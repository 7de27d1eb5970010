//! Camera-local to world-frame transformation.

use crate::core::{FrameId, Point3D, Pose, RawPoint};

/// Applies one frame's pose to its accepted samples.
///
/// The pose is used as given for this frame only; nothing is carried over
/// between frames.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransformer {
    pose: Pose,
    frame: FrameId,
    valid: bool,
}

impl CoordinateTransformer {
    /// Transformer for one frame
    pub fn new(pose: Pose, frame: FrameId) -> Self {
        Self {
            valid: pose.is_valid(),
            pose,
            frame,
        }
    }

    /// True if the pose can be applied
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Transform a single sample. `None` for an invalid pose or a
    /// non-finite result.
    #[inline]
    pub fn transform(&self, raw: &RawPoint) -> Option<Point3D> {
        if !self.valid {
            return None;
        }
        let point = self.pose.transform_raw(raw, self.frame);
        point.is_finite().then_some(point)
    }

    /// Lazily transform a sequence of samples
    pub fn apply<'a, I>(&self, points: I) -> impl Iterator<Item = Point3D> + 'a
    where
        I: IntoIterator<Item = &'a RawPoint>,
        I::IntoIter: 'a,
    {
        let transformer = *self;
        points
            .into_iter()
            .filter_map(move |raw| transformer.transform(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_translation() {
        let transformer = CoordinateTransformer::new(Pose::from_translation([1.0, 2.0, 3.0]), 7);
        let point = transformer
            .transform(&RawPoint::new(0.5, 0.0, -1.0, 0.8))
            .unwrap();
        assert_relative_eq!(point.x, 1.5);
        assert_relative_eq!(point.y, 2.0);
        assert_relative_eq!(point.z, 2.0);
        assert_eq!(point.confidence, 0.8);
        assert_eq!(point.frame, Some(7));
    }

    #[test]
    fn test_rotation_about_up_axis() {
        let transformer = CoordinateTransformer::new(Pose::from_yaw(FRAC_PI_2, [0.0; 3]), 1);
        let point = transformer
            .transform(&RawPoint::new(1.0, 0.5, 0.0, 0.6))
            .unwrap();
        assert_relative_eq!(point.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(point.y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(point.x.hypot(point.z), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_pose_yields_nothing() {
        let mut m = *Pose::identity().as_column_major();
        m[0] = f32::NAN;
        let transformer = CoordinateTransformer::new(Pose::from_column_major(m), 1);
        assert!(!transformer.is_valid());
        let raw = [RawPoint::new(0.0, 0.0, 0.0, 0.9)];
        assert_eq!(transformer.apply(&raw).count(), 0);
    }

    #[test]
    fn test_overflowing_result_dropped() {
        let transformer = CoordinateTransformer::new(Pose::from_translation([f32::MAX, 0.0, 0.0]), 1);
        assert!(
            transformer
                .transform(&RawPoint::new(f32::MAX, 0.0, 0.0, 0.9))
                .is_none()
        );
    }

    #[test]
    fn test_each_frame_applied_fresh() {
        let raw = RawPoint::new(0.1, 0.2, 0.3, 0.5);
        let first = CoordinateTransformer::new(Pose::from_translation([1.0, 0.0, 0.0]), 1);
        let second = CoordinateTransformer::new(Pose::from_translation([1.0, 0.0, 0.0]), 2);
        let a = first.transform(&raw).unwrap();
        let b = second.transform(&raw).unwrap();
        assert_eq!(a.position(), b.position());
    }
}
