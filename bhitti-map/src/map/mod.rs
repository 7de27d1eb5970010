//! Deduplicated, bounded spatial map.
//!
//! - [`SpatialMap`]: the map itself, single-threaded
//! - [`MapSnapshot`]: immutable copy handed to readers
//! - [`InsertOutcome`] / [`InsertStats`]: per-point and per-batch results

mod columns;
mod eviction;
mod order;
mod snapshot;
mod spatial_map;

pub use snapshot::MapSnapshot;
pub use spatial_map::{InsertOutcome, InsertStats, SpatialMap};
