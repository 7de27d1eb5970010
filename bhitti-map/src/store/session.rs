//! Map session: the raw and partial stores plus a persistence worker.
//!
//! Saving and loading run on a dedicated `map-persistence` thread so the
//! render loop never touches the filesystem. A save takes snapshots of both
//! maps on the calling thread and hands them to the worker, so the files
//! always reflect the maps at the moment `save` was called.
//!
//! Teardown (`shutdown` or drop) waits for queued persistence jobs, then
//! drains and stops both stores' updaters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::config::{BhittiConfig, SettingsReader};
use crate::error::{Error, Result};
use crate::io::{PersistenceError, artifact_path, load_or_empty, save_map};
use crate::map::MapSnapshot;
use crate::pipeline::FramePipeline;
use crate::status::{LogStatusSink, StatusBoard, StatusMessage};

use super::map_store::MapStore;

/// Queued persistence jobs before `save` is refused and `load` waits
const PERSISTENCE_QUEUE_CAPACITY: usize = 4;

/// Save result for one map.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedMap {
    /// Store name
    pub name: String,
    /// Target file
    pub path: PathBuf,
    /// Points written, zero if the write failed
    pub points: usize,
    /// Snapshot version saved
    pub version: u64,
    /// Why the map was not written, if it wasn't. A previous artifact at
    /// `path` is left untouched.
    pub error: Option<PersistenceError>,
}

/// Outcome of a save, reported per map.
///
/// Every map is attempted even when an earlier one fails.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveReport {
    /// Raw first, then partial
    pub maps: Vec<SavedMap>,
    /// Time spent writing
    pub elapsed: Duration,
}

impl SaveReport {
    /// Result for a store by name
    pub fn get(&self, name: &str) -> Option<&SavedMap> {
        self.maps.iter().find(|m| m.name == name)
    }

    /// True if every map was written
    pub fn is_complete(&self) -> bool {
        self.maps.iter().all(|m| m.error.is_none())
    }

    /// Maps that failed to write
    pub fn failed(&self) -> impl Iterator<Item = &SavedMap> {
        self.maps.iter().filter(|m| m.error.is_some())
    }
}

/// Load result for one map.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedMap {
    /// Store name
    pub name: String,
    /// File read
    pub path: PathBuf,
    /// Points now in the store
    pub points: usize,
    /// Why the store was left empty, if it was
    pub error: Option<PersistenceError>,
}

/// Outcome of a load, reported per map.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LoadReport {
    /// Raw first, then partial
    pub maps: Vec<LoadedMap>,
}

impl LoadReport {
    /// Result for a store by name
    pub fn get(&self, name: &str) -> Option<&LoadedMap> {
        self.maps.iter().find(|m| m.name == name)
    }

    /// True if every map loaded
    pub fn is_complete(&self) -> bool {
        self.maps.iter().all(|m| m.error.is_none())
    }

    /// True if any map failed for a reason other than never having been saved
    pub fn has_failures(&self) -> bool {
        self.maps
            .iter()
            .any(|m| matches!(&m.error, Some(e) if *e != PersistenceError::NeverSaved))
    }
}

/// Handle to a save running on the persistence worker.
#[derive(Debug)]
pub struct PendingSave {
    rx: Receiver<SaveReport>,
}

impl PendingSave {
    /// Block until the save finishes. Per-map write failures are in the
    /// report; check [`SaveReport::is_complete`].
    pub fn wait(self) -> Result<SaveReport> {
        self.rx.recv().map_err(|_| Error::WorkerGone("persistence"))
    }

    /// Report if the save has finished
    pub fn try_wait(&self) -> Option<Result<SaveReport>> {
        match self.rx.try_recv() {
            Ok(report) => Some(Ok(report)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerGone("persistence"))),
        }
    }
}

enum PersistenceJob {
    Save {
        snapshots: Vec<(String, PathBuf, Arc<MapSnapshot>)>,
        reply: Sender<SaveReport>,
    },
    Load {
        stores: Vec<(Arc<MapStore>, PathBuf)>,
        reply: Sender<LoadReport>,
    },
}

struct PersistenceWorker {
    tx: Option<Sender<PersistenceJob>>,
    thread: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    fn spawn(status: Arc<StatusBoard>) -> Result<Self> {
        let (tx, rx) = bounded(PERSISTENCE_QUEUE_CAPACITY);
        let thread = thread::Builder::new()
            .name("map-persistence".to_string())
            .spawn(move || Self::worker_loop(rx, status))?;
        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Handle for queueing jobs, until the worker is stopped
    fn sender(&self) -> Result<Sender<PersistenceJob>> {
        self.tx.clone().ok_or(Error::WorkerGone("persistence"))
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Persistence thread panicked");
        }
    }

    fn worker_loop(rx: Receiver<PersistenceJob>, status: Arc<StatusBoard>) {
        let mut jobs = 0u64;
        while let Ok(job) = rx.recv() {
            jobs += 1;
            match job {
                PersistenceJob::Save { snapshots, reply } => {
                    let report = Self::save_all(&snapshots);
                    if report.is_complete() {
                        status.hide(StatusMessage::MapSaveFailed);
                    } else {
                        status.show(StatusMessage::MapSaveFailed);
                    }
                    // The caller may have dropped its PendingSave
                    let _ = reply.send(report);
                }
                PersistenceJob::Load { stores, reply } => {
                    let report = Self::load_all(&stores);
                    if report.has_failures() {
                        status.show(StatusMessage::MapLoadFailed);
                    } else {
                        status.hide(StatusMessage::MapLoadFailed);
                    }
                    let _ = reply.send(report);
                }
            }
        }
        info!("Persistence thread exiting ({} jobs)", jobs);
    }

    fn save_all(snapshots: &[(String, PathBuf, Arc<MapSnapshot>)]) -> SaveReport {
        let start = Instant::now();
        let maps = snapshots
            .iter()
            .map(|(name, path, snapshot)| {
                let error = match save_map(snapshot, path) {
                    Ok(()) => {
                        info!(
                            "[{}] Saved {} points to {}",
                            name,
                            snapshot.len(),
                            path.display()
                        );
                        None
                    }
                    Err(e) => {
                        warn!("[{}] Failed to save {}: {}", name, path.display(), e);
                        Some(e)
                    }
                };
                SavedMap {
                    name: name.clone(),
                    path: path.clone(),
                    points: if error.is_none() { snapshot.len() } else { 0 },
                    version: snapshot.version(),
                    error,
                }
            })
            .collect();

        SaveReport {
            maps,
            elapsed: start.elapsed(),
        }
    }

    fn load_all(stores: &[(Arc<MapStore>, PathBuf)]) -> LoadReport {
        let mut report = LoadReport::default();
        for (store, path) in stores {
            let name = store.name().to_string();
            let (map, error) = match load_or_empty(path, store.policy()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    // Store policies are validated at construction
                    error!("[{}] Invalid policy while loading: {}", name, e);
                    report.maps.push(LoadedMap {
                        name,
                        path: path.clone(),
                        points: store.len(),
                        error: Some(PersistenceError::InvalidPolicy(e)),
                    });
                    continue;
                }
            };

            match &error {
                None => info!("[{}] Loaded {} points from {}", name, map.len(), path.display()),
                Some(PersistenceError::NeverSaved) => {
                    debug!("[{}] No saved map at {}", name, path.display())
                }
                Some(e) => warn!("[{}] Failed to load {}: {}", name, path.display(), e),
            }

            let points = map.len();
            store.replace_map(map);
            report.maps.push(LoadedMap {
                name,
                path: path.clone(),
                points,
                error,
            });
        }
        report
    }
}

/// Queue a job without waiting for room.
fn try_enqueue(tx: &Sender<PersistenceJob>, job: PersistenceJob) -> Result<()> {
    tx.try_send(job).map_err(|e| match e {
        TrySendError::Full(_) => Error::WorkerBusy("persistence"),
        TrySendError::Disconnected(_) => Error::WorkerGone("persistence"),
    })
}

/// The two map stores of an AR session and their persistence.
pub struct MapSession {
    raw: Arc<MapStore>,
    partial: Arc<MapStore>,
    dir: PathBuf,
    status: Arc<StatusBoard>,
    worker: Mutex<PersistenceWorker>,
}

impl MapSession {
    /// Create empty stores from the configuration, reporting status to the
    /// log.
    pub fn new(config: &BhittiConfig) -> Result<Self> {
        Self::with_status(config, Arc::new(StatusBoard::new(Box::new(LogStatusSink))))
    }

    /// Create empty stores with a custom status board
    pub fn with_status(config: &BhittiConfig, status: Arc<StatusBoard>) -> Result<Self> {
        config.maps.raw.validate()?;
        config.maps.partial.validate()?;

        let raw = Arc::new(MapStore::new(config.maps.raw.clone())?);
        let partial = Arc::new(MapStore::new(config.maps.partial.clone())?);
        let worker = PersistenceWorker::spawn(Arc::clone(&status))?;

        Ok(Self {
            raw,
            partial,
            dir: config.persistence.dir_path(),
            status,
            worker: Mutex::new(worker),
        })
    }

    /// Create the session and, if configured, load the saved maps.
    pub fn open(config: &BhittiConfig, status: Arc<StatusBoard>) -> Result<(Self, LoadReport)> {
        let session = Self::with_status(config, status)?;
        let report = if config.persistence.load_on_start {
            session.load()?
        } else {
            LoadReport::default()
        };
        Ok((session, report))
    }

    /// Raw/full map store
    pub fn raw(&self) -> &Arc<MapStore> {
        &self.raw
    }

    /// Partial/session map store
    pub fn partial(&self) -> &Arc<MapStore> {
        &self.partial
    }

    /// Both stores, raw first
    pub fn stores(&self) -> [&Arc<MapStore>; 2] {
        [&self.raw, &self.partial]
    }

    /// Directory holding the artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Status board shared with the pipeline
    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Build the per-frame pipeline over both stores
    pub fn pipeline(&self, settings: SettingsReader) -> FramePipeline {
        FramePipeline::new(
            vec![Arc::clone(&self.raw), Arc::clone(&self.partial)],
            settings,
            Arc::clone(&self.status),
        )
    }

    /// Path of a store's artifact
    pub fn artifact_path(&self, store: &MapStore) -> PathBuf {
        artifact_path(&self.dir, &store.policy().artifact)
    }

    /// Save both maps in the background.
    ///
    /// Snapshots are taken now; the returned handle reports completion.
    /// Never blocks: if the persistence queue is full the save is refused
    /// with [`Error::WorkerBusy`].
    pub fn save(&self) -> Result<PendingSave> {
        let snapshots = self
            .stores()
            .into_iter()
            .map(|store| {
                (
                    store.name().to_string(),
                    self.artifact_path(store),
                    store.snapshot(),
                )
            })
            .collect();
        let tx = self.worker.lock().sender()?;
        let (reply, rx) = bounded(1);
        try_enqueue(&tx, PersistenceJob::Save { snapshots, reply })?;
        Ok(PendingSave { rx })
    }

    /// Load both maps, replacing the stores' contents.
    ///
    /// A map that is missing or unreadable leaves its store empty; the
    /// reason is reported per map.
    pub fn load(&self) -> Result<LoadReport> {
        let stores = self
            .stores()
            .into_iter()
            .map(|store| (Arc::clone(store), self.artifact_path(store)))
            .collect();
        // Waits for queue room outside the worker lock so `save` stays
        // non-blocking
        let tx = self.worker.lock().sender()?;
        let (reply, rx) = bounded(1);
        tx.send(PersistenceJob::Load { stores, reply })
            .map_err(|_| Error::WorkerGone("persistence"))?;
        drop(tx);
        rx.recv().map_err(|_| Error::WorkerGone("persistence"))
    }

    /// Clear both stores
    pub fn reset(&self) {
        self.raw.clear();
        self.partial.clear();
    }

    /// Wait for persistence jobs, drain both updaters and stop all threads.
    pub fn shutdown(&self) {
        self.worker.lock().stop();
        self.raw.shutdown();
        self.partial.shutdown();
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("raw", &self.raw)
            .field("partial", &self.partial)
            .field("dir", &self.dir)
            .finish()
    }
}
