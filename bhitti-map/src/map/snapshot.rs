//! Immutable map snapshots for readers.

use std::sync::Arc;

use crate::config::{EvictionPolicy, MapPolicy};
use crate::core::{Bounds3, Point3D};

/// Immutable copy of a map at one version.
///
/// Points are in insertion order (oldest observation first). Cloning is
/// cheap: the point buffer is shared.
#[derive(Clone, Debug)]
pub struct MapSnapshot {
    version: u64,
    resolution: f32,
    capacity: usize,
    eviction: EvictionPolicy,
    points: Arc<[Point3D]>,
    bounds: Option<Bounds3>,
}

impl MapSnapshot {
    /// Snapshot of an empty map built with `policy`
    pub fn empty(policy: &MapPolicy) -> Self {
        Self::new(0, policy, Vec::new())
    }

    pub(crate) fn new(version: u64, policy: &MapPolicy, points: Vec<Point3D>) -> Self {
        let bounds = Bounds3::from_points(&points);
        Self {
            version,
            resolution: policy.resolution,
            capacity: policy.max_points,
            eviction: policy.eviction,
            points: Arc::from(points),
            bounds,
        }
    }

    /// Map version the snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Grid resolution of the source map (meters)
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Capacity of the source map
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Eviction strategy of the source map
    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Points in insertion order
    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    /// Shared point buffer
    pub fn shared_points(&self) -> Arc<[Point3D]> {
        Arc::clone(&self.points)
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the snapshot holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box, `None` when empty
    pub fn bounds(&self) -> Option<Bounds3> {
        self.bounds
    }

    /// Iterate the points
    pub fn iter(&self) -> std::slice::Iter<'_, Point3D> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a MapSnapshot {
    type Item = &'a Point3D;
    type IntoIter = std::slice::Iter<'a, Point3D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
