//! Core types for the bhitti map accumulator.
//!
//! ## Coordinate System
//!
//! Follows the AR SDK world convention:
//! - **X-axis**: right
//! - **Y-axis**: up (gravity aligned)
//! - **Z-axis**: backward (camera looks down -Z)
//!
//! The world frame is anchored at session start. Camera-local samples are
//! mapped into it with the per-frame [`Pose`].
//!
//! ## Type Categories
//!
//! - [`RawPoint`]: camera-local depth sample with confidence
//! - [`Point3D`]: world-frame point stored in the map
//! - [`CellKey`]: quantized grid cell used for deduplication
//! - [`Bounds3`]: axis-aligned box
//! - [`Pose`]: 4×4 world-from-camera transform
//! - [`FrameSample`] / [`FrameAcquisition`]: per-frame input

mod frame;
mod point;
mod pose;

pub use frame::{FrameAcquisition, FrameSample, FrameSource};
pub use point::{Bounds3, CellKey, FrameId, Point3D, RawPoint};
pub use pose::Pose;
