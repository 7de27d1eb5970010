//! Rendering-side views of the maps.

mod projection;

pub use projection::{MapOverlay, MapProjection, Marker, ProjectedPoint, Viewport};
