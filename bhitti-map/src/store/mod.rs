//! Map stores and the session that owns them.
//!
//! - [`MapStore`]: one map with synchronous and background update paths
//! - [`MapSession`]: raw + partial stores, persistence worker, teardown

mod map_store;
mod session;
mod updater;

pub use map_store::{MapStore, StoreStats};
pub use session::{LoadReport, LoadedMap, MapSession, PendingSave, SaveReport, SavedMap};
pub use updater::Submitted;
