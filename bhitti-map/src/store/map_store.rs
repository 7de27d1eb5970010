//! A map store: one [`SpatialMap`] plus its writer discipline.
//!
//! ## Concurrency
//!
//! - Writers (synchronous updates, the background updater, `clear`, map
//!   replacement) are linearized by the map mutex.
//! - Every writer publishes a fresh [`MapSnapshot`] before releasing the map
//!   mutex, so published versions are monotonic and readers never observe a
//!   half-applied batch.
//! - Readers clone the published `Arc` and never touch the map mutex.
//! - `clear` bumps a generation counter under the map mutex; frames queued
//!   before the clear carry the old generation and are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::{MapPolicy, ScanSettings};
use crate::core::{FrameSample, Point3D};
use crate::error::Result;
use crate::map::{InsertStats, MapSnapshot, SpatialMap};
use crate::pipeline::{CoordinateTransformer, PointFilter};

use super::updater::{Job, Progress, Submitted, Updater};

/// Cumulative store statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Frames handed to the background updater
    pub frames_submitted: u64,
    /// Frames whose points were inserted (sync and async)
    pub frames_applied: u64,
    /// Frames displaced from the queue, stale after a reset, or refused
    /// after shutdown
    pub frames_dropped: u64,
    /// Number of resets
    pub resets: u64,
    /// Point-level counters over all applied frames
    pub points: InsertStats,
}

/// State shared between a store handle and its updater thread.
pub(crate) struct StoreShared {
    pub(crate) policy: MapPolicy,
    map: Mutex<SpatialMap>,
    published: RwLock<Arc<MapSnapshot>>,
    generation: AtomicU64,
    stats: Mutex<StoreStats>,
    pub(crate) progress: Progress,
}

impl StoreShared {
    fn new(map: SpatialMap) -> Self {
        let snapshot = Arc::new(map.snapshot());
        Self {
            policy: map.policy().clone(),
            map: Mutex::new(map),
            published: RwLock::new(snapshot),
            generation: AtomicU64::new(0),
            stats: Mutex::new(StoreStats::default()),
            progress: Progress::default(),
        }
    }

    /// Filter, transform and insert one frame.
    ///
    /// With `generation` set, the frame is skipped (returning `None`) if the
    /// store was reset after it was queued.
    pub(crate) fn apply(
        &self,
        frame: &FrameSample,
        settings: &ScanSettings,
        generation: Option<u64>,
    ) -> Option<InsertStats> {
        let points = prepare_points(frame, settings);

        let mut map = self.map.lock();
        if let Some(generation) = generation
            && generation != self.generation.load(Ordering::SeqCst)
        {
            drop(map);
            self.record_dropped();
            return None;
        }
        let stats = map.insert_batch(points, settings.min_confidence);
        self.publish(&map);
        drop(map);

        let mut totals = self.stats.lock();
        totals.frames_applied += 1;
        totals.points.merge(&stats);
        Some(stats)
    }

    /// Publish a snapshot if the map changed. Caller holds the map lock.
    fn publish(&self, map: &SpatialMap) {
        let published = self.published.read().version();
        if published != map.version() {
            *self.published.write() = Arc::new(map.snapshot());
        }
    }

    pub(crate) fn record_dropped(&self) {
        self.stats.lock().frames_dropped += 1;
    }
}

/// Filter and transform a frame into world-frame points.
fn prepare_points(frame: &FrameSample, settings: &ScanSettings) -> Vec<Point3D> {
    let filter = PointFilter::from_settings(settings);
    let transformer = CoordinateTransformer::new(frame.pose, frame.id);
    transformer.apply(filter.apply(frame)).collect()
}

/// One map instance with its update paths.
///
/// The raw and partial maps are both `MapStore`s built from different
/// [`MapPolicy`] values.
pub struct MapStore {
    shared: Arc<StoreShared>,
    updater: Mutex<Updater>,
}

impl MapStore {
    /// Create an empty store and start its updater thread.
    pub fn new(policy: MapPolicy) -> Result<Self> {
        Self::from_map(SpatialMap::new(policy)?)
    }

    /// Wrap an existing map (e.g. one loaded from disk).
    pub fn from_map(map: SpatialMap) -> Result<Self> {
        let shared = Arc::new(StoreShared::new(map));
        let updater = Updater::spawn(Arc::clone(&shared))?;
        log::info!(
            "[{}] Map store ready (max {} points, {:.3} m cells, {:?})",
            shared.policy.name,
            shared.policy.max_points,
            shared.policy.resolution,
            shared.policy.eviction
        );
        Ok(Self {
            shared,
            updater: Mutex::new(updater),
        })
    }

    /// Policy the store was created with.
    ///
    /// [`replace_map`](Self::replace_map) may install a map with a different
    /// grid resolution (a map loaded from disk keeps the resolution it was
    /// saved with). Use [`resolution`](Self::resolution) or the snapshot for
    /// the cell size of the points actually stored.
    pub fn policy(&self) -> &MapPolicy {
        &self.shared.policy
    }

    /// Grid resolution of the live map
    pub fn resolution(&self) -> f32 {
        self.shared.published.read().resolution()
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.shared.policy.name
    }

    /// Update synchronously: the new points are visible in
    /// [`snapshot`](Self::snapshot) when this returns.
    pub fn update_map_state(&self, frame: &FrameSample, settings: &ScanSettings) -> InsertStats {
        self.shared
            .apply(frame, settings, None)
            .unwrap_or_default()
    }

    /// Update on the background updater without waiting.
    ///
    /// At most one frame waits for the updater; a newer submission replaces
    /// it.
    pub fn update_map_state_async(
        &self,
        frame: Arc<FrameSample>,
        settings: Arc<ScanSettings>,
    ) -> Submitted {
        let job = Job {
            frame,
            settings,
            generation: self.shared.generation.load(Ordering::SeqCst),
        };
        let submitted = self.updater.lock().submit(job, &self.shared);
        if submitted != Submitted::Closed {
            self.shared.stats.lock().frames_submitted += 1;
        }
        submitted
    }

    /// Last published snapshot. Never waits for an in-flight update.
    pub fn snapshot(&self) -> Arc<MapSnapshot> {
        self.shared.published.read().clone()
    }

    /// Stored point count
    pub fn len(&self) -> usize {
        self.shared.map.lock().len()
    }

    /// True if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the map under the writer lock
    pub fn inspect<R>(&self, f: impl FnOnce(&SpatialMap) -> R) -> R {
        f(&self.shared.map.lock())
    }

    /// Drop every point and publish an empty snapshot. Frames queued before
    /// the reset are discarded.
    pub fn clear(&self) {
        let mut map = self.shared.map.lock();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = map.len();
        map.clear();
        self.shared.publish(&map);
        drop(map);

        self.shared.stats.lock().resets += 1;
        log::info!("[{}] Map reset ({} points dropped)", self.name(), dropped);
    }

    /// Replace the map wholesale (session load). The replacement's version
    /// is raised past the current one; queued frames are discarded.
    pub fn replace_map(&self, mut replacement: SpatialMap) {
        let mut map = self.shared.map.lock();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        replacement.raise_version(map.version() + 1);
        *map = replacement;
        self.shared.publish(&map);
        log::info!("[{}] Map replaced ({} points)", self.name(), map.len());
    }

    /// Block until all submitted background work is applied or dropped.
    /// Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.progress.wait_idle(timeout)
    }

    /// Cumulative statistics
    pub fn stats(&self) -> StoreStats {
        *self.shared.stats.lock()
    }

    /// True until [`shutdown`](Self::shutdown)
    pub fn is_running(&self) -> bool {
        self.updater.lock().is_running()
    }

    /// Drain pending background work and stop the updater thread.
    /// Later async submissions return [`Submitted::Closed`].
    pub fn shutdown(&self) {
        self.updater.lock().stop();
    }
}

impl std::fmt::Debug for MapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapStore")
            .field("name", &self.shared.policy.name)
            .field("version", &self.snapshot().version())
            .finish()
    }
}
