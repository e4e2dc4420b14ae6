//! Atomically swappable registry snapshot.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::Registry;

/// Holds the published registry.
///
/// Readers take a cheap `Arc` clone and keep using that snapshot for the
/// whole call, even if a reload publishes a new one meanwhile.
#[derive(Debug, Default)]
pub struct RegistryStore {
    current: RwLock<Arc<Registry>>,
    generation: AtomicU64,
}

impl RegistryStore {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<Registry> {
        self.current.read().clone()
    }

    /// Replace the snapshot and return the new generation.
    pub fn publish(&self, registry: Registry) -> u64 {
        let registry = Arc::new(registry);
        *self.current.write() = registry;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of snapshots published since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
