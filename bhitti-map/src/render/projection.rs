//! Top-down 2D projection of a map snapshot for the overlay.
//!
//! World X maps to canvas X and world Z to canvas Y, scaled by
//! `map_scale` pixels per meter around the canvas center plus the
//! configured offsets. Height (Y) is dropped.

use crate::config::ScanSettings;
use crate::core::Pose;
use crate::map::MapSnapshot;

/// Canvas size in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Width (pixels)
    pub width: f32,
    /// Height (pixels)
    pub height: f32,
}

impl Viewport {
    /// Create a viewport
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True if the pixel lies on the canvas
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width && y < self.height
    }
}

/// A projected map point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedPoint {
    /// Canvas X (pixels)
    pub x: f32,
    /// Canvas Y (pixels)
    pub y: f32,
    /// Source confidence
    pub confidence: f32,
}

/// Camera position marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    /// Canvas X (pixels)
    pub x: f32,
    /// Canvas Y (pixels)
    pub y: f32,
    /// Marker size (pixels)
    pub size: f32,
}

/// Everything the overlay draws for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapOverlay {
    /// Snapshot version the overlay was built from
    pub version: u64,
    /// Points on the canvas
    pub points: Vec<ProjectedPoint>,
    /// Camera marker, when enabled and on the canvas
    pub marker: Option<Marker>,
    /// Points in the snapshot before sampling and clipping
    pub source_points: usize,
}

/// World-to-canvas mapping for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapProjection {
    scale: f32,
    origin_x: f32,
    origin_y: f32,
}

impl MapProjection {
    /// Projection for a viewport and the current settings
    pub fn new(viewport: Viewport, settings: &ScanSettings) -> Self {
        Self {
            scale: settings.map_scale,
            origin_x: viewport.width / 2.0 + settings.map_offset_x,
            origin_y: viewport.height / 2.0 + settings.map_offset_y,
        }
    }

    /// Canvas position of a world (x, z) position
    #[inline]
    pub fn to_canvas(&self, x: f32, z: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y + z * self.scale)
    }

    /// Project a snapshot and the camera position.
    ///
    /// At most `max_render_points` points are kept, sampled with a uniform
    /// stride over the snapshot; points off the canvas are dropped.
    pub fn project(
        snapshot: &MapSnapshot,
        camera: &Pose,
        viewport: Viewport,
        settings: &ScanSettings,
    ) -> MapOverlay {
        let projection = Self::new(viewport, settings);
        let limit = settings.max_render_points;

        let mut points = Vec::new();
        if limit > 0 && !snapshot.is_empty() {
            let stride = snapshot.len().div_ceil(limit);
            points.reserve(snapshot.len().min(limit));
            for point in snapshot.iter().step_by(stride) {
                let (x, y) = projection.to_canvas(point.x, point.z);
                if viewport.contains(x, y) {
                    points.push(ProjectedPoint {
                        x,
                        y,
                        confidence: point.confidence,
                    });
                }
            }
        }

        let marker = if settings.marker_visible && camera.is_valid() {
            let [cx, _, cz] = camera.translation();
            let (x, y) = projection.to_canvas(cx, cz);
            viewport.contains(x, y).then_some(Marker {
                x,
                y,
                size: settings.marker_size,
            })
        } else {
            None
        };

        MapOverlay {
            version: snapshot.version(),
            points,
            marker,
            source_points: snapshot.len(),
        }
    }
}
