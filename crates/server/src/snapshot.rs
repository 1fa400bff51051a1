//! The process-wide snapshot generation.
//!
//! A request takes one `Arc<Snapshot>` at its start and reads only from it,
//! so a reload never changes tables under a running request. The lock is
//! held just long to clone or replace the `Arc`.

use data_loader::Snapshot;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

struct Generation {
    number: u64,
    snapshot: Arc<Snapshot>,
}

/// Shared handle to the current snapshot generation
#[derive(Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Generation>>,
}

impl SnapshotHandle {
    /// Start at generation 1 with `snapshot`
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Generation {
                number: 1,
                snapshot,
            })),
        }
    }

    /// Load, validate, and wrap a snapshot directory
    pub fn load(data_dir: &Path) -> data_loader::Result<Self> {
        let snapshot = Snapshot::load_from_dir(data_dir)?;
        Ok(Self::new(Arc::new(snapshot)))
    }

    /// The snapshot requests should read from
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.read().snapshot.clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().number
    }

    /// Install `snapshot` as the next generation; returns its number.
    ///
    /// Requests already holding the previous generation finish on it.
    pub fn swap(&self, snapshot: Arc<Snapshot>) -> u64 {
        let mut current = self.current.write();
        current.number += 1;
        current.snapshot = snapshot;
        info!("Installed snapshot generation {}", current.number);
        current.number
    }

    /// Load `data_dir` and swap it in. Blocking; run it off the async
    /// workers (e.g. `spawn_blocking`).
    pub fn reload(&self, data_dir: &Path) -> data_loader::Result<u64> {
        let snapshot = Snapshot::load_from_dir(data_dir)?;
        Ok(self.swap(Arc::new(snapshot)))
    }
}
