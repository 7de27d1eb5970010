//! Per-frame pipeline: acquisition → filter → transform → insert.
//!
//! The render loop calls [`FramePipeline::process`] once per frame with the
//! result of the acquisition step. Frames without tracking or pose never
//! touch a map; they only update the status board. Ready frames go to every
//! store: blocking stores are updated before `process` returns, background
//! stores get an asynchronous submission.

mod filter;
mod transform;

pub use filter::PointFilter;
pub use transform::CoordinateTransformer;

use std::sync::Arc;

use log::{debug, info};

use crate::config::{SettingsReader, UpdateMode};
use crate::core::{FrameAcquisition, FrameId, FrameSource};
use crate::map::InsertStats;
use crate::status::{StatusBoard, StatusMessage};
use crate::store::{MapStore, Submitted};

/// Why a frame did not reach the maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Tracking paused or lost
    NotTracking,
    /// Tracking OK but no usable pose
    NoPose,
}

/// Result of processing one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// No map was touched
    Skipped(SkipReason),
    /// The frame was fed to the stores
    Updated {
        /// Frame identifier
        frame: FrameId,
        /// Merged counters of the blocking stores
        stats: InsertStats,
        /// Submission result per background store
        submitted: Vec<Submitted>,
    },
}

/// Counters over a [`FramePipeline::run_frames`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames acquired
    pub frames: usize,
    /// Frames fed to the stores
    pub updated: usize,
    /// Frames skipped without tracking
    pub not_tracking: usize,
    /// Frames skipped without pose
    pub no_pose: usize,
    /// Merged counters of the blocking stores
    pub points: InsertStats,
}

/// Drives the map stores from the render loop.
pub struct FramePipeline {
    stores: Vec<Arc<MapStore>>,
    settings: SettingsReader,
    status: Arc<StatusBoard>,
    tracking: bool,
    frames_processed: u64,
}

impl FramePipeline {
    /// Create a pipeline over `stores`. Shows
    /// [`StatusMessage::WaitingForDepth`] until the first ready frame.
    pub fn new(
        stores: Vec<Arc<MapStore>>,
        settings: SettingsReader,
        status: Arc<StatusBoard>,
    ) -> Self {
        status.show(StatusMessage::WaitingForDepth);
        Self {
            stores,
            settings,
            status,
            tracking: false,
            frames_processed: 0,
        }
    }

    /// Stores fed by this pipeline
    pub fn stores(&self) -> &[Arc<MapStore>] {
        &self.stores
    }

    /// Status board
    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Ready frames processed so far
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Process one acquisition result.
    pub fn process(&mut self, acquisition: FrameAcquisition) -> FrameOutcome {
        match acquisition {
            FrameAcquisition::NotTracking => {
                self.status.hide(StatusMessage::NoPose);
                self.status.show(StatusMessage::NoTracking);
                if self.tracking {
                    self.on_tracking_lost();
                }
                self.tracking = false;
                FrameOutcome::Skipped(SkipReason::NotTracking)
            }
            FrameAcquisition::NoPose => {
                self.status.hide(StatusMessage::NoTracking);
                self.status.show(StatusMessage::NoPose);
                self.tracking = true;
                FrameOutcome::Skipped(SkipReason::NoPose)
            }
            FrameAcquisition::Ready(frame) => {
                self.status.hide(StatusMessage::NoTracking);
                self.status.hide(StatusMessage::NoPose);
                self.status.hide(StatusMessage::WaitingForDepth);
                self.tracking = true;
                self.frames_processed += 1;

                // One settings view for the whole frame
                let settings = self.settings.current();
                let frame = Arc::new(frame);
                let id = frame.id;

                let mut submitted = Vec::new();
                for store in &self.stores {
                    if store.policy().update_mode == UpdateMode::Background {
                        submitted.push(
                            store.update_map_state_async(Arc::clone(&frame), Arc::clone(&settings)),
                        );
                    }
                }

                let mut stats = InsertStats::default();
                for store in &self.stores {
                    if store.policy().update_mode == UpdateMode::Blocking {
                        stats.merge(&store.update_map_state(&frame, &settings));
                    }
                }

                debug!(
                    "Frame {}: {} points, {} accepted by blocking stores",
                    id,
                    frame.len(),
                    stats.accepted()
                );
                FrameOutcome::Updated {
                    frame: id,
                    stats,
                    submitted,
                }
            }
        }
    }

    /// Acquire and process up to `frames` frames from `source`.
    pub fn run_frames<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        frames: usize,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..frames {
            summary.frames += 1;
            match self.process(source.acquire()) {
                FrameOutcome::Skipped(SkipReason::NotTracking) => summary.not_tracking += 1,
                FrameOutcome::Skipped(SkipReason::NoPose) => summary.no_pose += 1,
                FrameOutcome::Updated { stats, .. } => {
                    summary.updated += 1;
                    summary.points.merge(&stats);
                }
            }
        }
        summary
    }

    fn on_tracking_lost(&self) {
        for store in &self.stores {
            if store.policy().reset_on_tracking_loss {
                info!("[{}] Tracking lost, resetting map", store.name());
                store.clear();
            }
        }
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("stores", &self.stores.len())
            .field("tracking", &self.tracking)
            .field("frames_processed", &self.frames_processed)
            .finish()
    }
}
