//! Point and cell key types for the spatial map.

use serde::{Deserialize, Serialize};

/// Frame identifier assigned by the sensing collaborator.
pub type FrameId = u64;

/// A raw depth sample in camera-local space: `(x, y, z, confidence)`.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPoint {
    /// X coordinate in meters (camera right)
    pub x: f32,
    /// Y coordinate in meters (camera up)
    pub y: f32,
    /// Z coordinate in meters (camera backward)
    pub z: f32,
    /// Sensor certainty that the sample is valid, in [0, 1]
    pub confidence: f32,
}

impl RawPoint {
    /// Create a new raw point
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z,
            confidence,
        }
    }

    /// True if every component is finite and confidence lies in [0, 1].
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }

    /// Position as an array
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// A world-frame point stored in the map.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters (up)
    pub y: f32,
    /// Z coordinate in meters
    pub z: f32,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Frame the observation came from, if known
    #[serde(default)]
    pub frame: Option<FrameId>,
}

impl Point3D {
    /// Create a point without provenance
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z,
            confidence,
            frame: None,
        }
    }

    /// Attach the frame this point was observed in
    #[inline]
    pub fn with_frame(mut self, frame: FrameId) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Position as an array
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// True if position and confidence are finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.confidence.is_finite()
    }
}

/// Quantized grid cell identifier used to deduplicate points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellKey {
    /// Cell index along X
    pub x: i32,
    /// Cell index along Y
    pub y: i32,
    /// Cell index along Z
    pub z: i32,
}

impl CellKey {
    /// Create a new cell key
    #[inline]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Quantize a world position at the given resolution (meters per cell).
    ///
    /// Returns `None` for non-finite input or indices outside `i32`.
    #[inline]
    pub fn from_position(x: f32, y: f32, z: f32, resolution: f32) -> Option<Self> {
        Some(Self {
            x: quantize(x, resolution)?,
            y: quantize(y, resolution)?,
            z: quantize(z, resolution)?,
        })
    }

    /// Key of a stored point
    #[inline]
    pub fn of(point: &Point3D, resolution: f32) -> Option<Self> {
        Self::from_position(point.x, point.y, point.z, resolution)
    }

    /// Ground-plane column (X, Z) containing this cell
    #[inline]
    pub fn column(&self) -> (i32, i32) {
        (self.x, self.z)
    }
}

#[inline]
fn quantize(value: f32, resolution: f32) -> Option<i32> {
    let cell = (value / resolution).floor();
    if cell.is_finite() && cell >= i32::MIN as f32 && cell < i32::MAX as f32 {
        Some(cell as i32)
    } else {
        None
    }
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    /// Minimum corner
    pub min: [f32; 3],
    /// Maximum corner
    pub max: [f32; 3],
}

impl Bounds3 {
    /// Degenerate bounds around a single point
    pub fn from_point(point: &Point3D) -> Self {
        let p = point.position();
        Self { min: p, max: p }
    }

    /// Smallest box containing every point, `None` if there are none
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3D>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(first);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Grow to include a point
    pub fn extend(&mut self, point: &Point3D) {
        let p = point.position();
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    /// True if the point lies inside (inclusive)
    pub fn contains(&self, point: &Point3D) -> bool {
        let p = point.position();
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Extent along each axis
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}
