//! # Bhitti
//!
//! Incremental spatial map accumulator for AR raw-depth point clouds.
//!
//! ## Overview
//!
//! Every rendered frame the AR sensing stack delivers a noisy camera-local
//! point cloud with per-point confidence plus a camera pose. Bhitti filters
//! the cloud, moves it into the session's world frame and merges it into
//! bounded, deduplicated point maps that can be rendered, saved and loaded.
//!
//! - **Filtering**: confidence threshold and optional vertical band
//! - **Deduplication**: one point per grid cell, most confident wins
//! - **Bounded memory**: oldest-first or lowest-confidence-first eviction
//! - **Two stores**: raw map (large, background updates, kept for export)
//!   and partial map (small, updated before each frame is drawn, reset on
//!   tracking loss)
//! - **Persistence**: versioned `.bhmap` binary format
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bhitti_map::{BhittiConfig, FrameAcquisition, MapSession, SettingsHandle};
//!
//! let config = BhittiConfig::load_default()?;
//! let settings = SettingsHandle::new(config.scan.clone())?;
//! let session = MapSession::new(&config)?;
//! let mut pipeline = session.pipeline(settings.reader());
//!
//! // Once per rendered frame
//! let outcome = pipeline.process(FrameAcquisition::from_frame(frame));
//! let snapshot = session.partial().snapshot();
//!
//! // On explicit save; write failures are reported per map
//! let saved = session.save()?.wait()?;
//! if !saved.is_complete() {
//!     log::warn!("Some maps were not saved");
//! }
//! ```
//!
//! ## Coordinate System
//!
//! AR world convention: X right, Y up (gravity aligned), Z backward.

#![warn(missing_docs)]

// Core types
pub mod core;

// Unified configuration
pub mod config;

// Deduplicated spatial map
pub mod map;

// Filter and transform stages, per-frame driver
pub mod pipeline;

// Map stores and session
pub mod store;

// Persistence (save/load)
pub mod io;

// Overlay projection
pub mod render;

// User-visible status
pub mod status;

mod error;

// Re-export commonly used types
pub use crate::core::{
    Bounds3, CellKey, FrameAcquisition, FrameId, FrameSample, FrameSource, Point3D, Pose,
    RawPoint,
};

pub use config::{
    BhittiConfig, ConfigLoadError, EvictionPolicy, MapPolicy, ScanSettings, SettingsError,
    SettingsHandle, SettingsReader, UpdateMode, VerticalBand,
};

pub use error::{Error, Result};
pub use io::PersistenceError;
pub use map::{InsertOutcome, InsertStats, MapSnapshot, SpatialMap};
pub use pipeline::{
    CoordinateTransformer, FrameOutcome, FramePipeline, PointFilter, RunSummary, SkipReason,
};
pub use render::{MapOverlay, MapProjection, Viewport};
pub use status::{
    ChannelStatusSink, LogStatusSink, NullStatusSink, StatusBoard, StatusEvent, StatusMessage,
    StatusSink,
};
pub use store::{LoadReport, MapSession, MapStore, PendingSave, SaveReport, StoreStats, Submitted};
