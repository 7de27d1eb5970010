//! Per-frame input from the sensing collaborator.

use super::point::{FrameId, RawPoint};
use super::pose::Pose;

/// One frame of raw depth: camera-local samples plus the camera pose.
///
/// Created once per rendered frame and never mutated. When handed to a
/// background worker it is shared as `Arc<FrameSample>`.
#[derive(Clone, Debug, Default)]
pub struct FrameSample {
    /// Frame identifier (monotonically increasing)
    pub id: FrameId,
    /// Capture timestamp in nanoseconds
    pub timestamp_ns: i64,
    /// World-from-camera transform
    pub pose: Pose,
    /// Camera-local samples in sensor order
    pub points: Vec<RawPoint>,
}

impl FrameSample {
    /// Create a frame sample
    pub fn new(id: FrameId, pose: Pose, points: Vec<RawPoint>) -> Self {
        Self {
            id,
            timestamp_ns: 0,
            pose,
            points,
        }
    }

    /// Set the capture timestamp
    pub fn with_timestamp(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Number of raw samples
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the frame carries no samples
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Result of the per-frame acquisition step.
#[derive(Clone, Debug)]
pub enum FrameAcquisition {
    /// Tracking is paused or lost; the frame must not touch any map
    NotTracking,
    /// Tracking reports OK but no usable pose is available
    NoPose,
    /// A complete frame ready for the pipeline
    Ready(FrameSample),
}

impl FrameAcquisition {
    /// Build an acquisition from a frame, demoting invalid poses to `NoPose`.
    pub fn from_frame(frame: FrameSample) -> Self {
        if frame.pose.is_valid() {
            FrameAcquisition::Ready(frame)
        } else {
            FrameAcquisition::NoPose
        }
    }

    /// True for `Ready`
    pub fn is_ready(&self) -> bool {
        matches!(self, FrameAcquisition::Ready(_))
    }
}

/// Boundary to the AR sensing collaborator.
pub trait FrameSource {
    /// Acquire the next frame. Called once per render cycle.
    fn acquire(&mut self) -> FrameAcquisition;
}

impl<F> FrameSource for F
where
    F: FnMut() -> FrameAcquisition,
{
    fn acquire(&mut self) -> FrameAcquisition {
        self()
    }
}
