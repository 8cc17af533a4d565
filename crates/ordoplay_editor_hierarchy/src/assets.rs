// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference-counted template assets and the asset-ready event pump.
//!
//! Loading is asynchronous from the point of view of the hierarchy core: a
//! load is requested, and the asset becomes resident only when the event
//! queue is pumped. Every [`AssetHandle`] is a strong reference; an asset with
//! no handles left may be unloaded by [`AssetManager::release_unreferenced`].

use crate::ids::AssetId;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Residency of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetState {
    /// Known but not in memory
    #[default]
    Unloaded,
    /// Load requested, waiting for the event pump
    Loading,
    /// Resident in memory
    Ready,
    /// Removed from the project; load requests never complete
    Missing,
}

#[derive(Debug)]
struct AssetEntry {
    id: AssetId,
    state: Mutex<AssetState>,
}

/// Strong reference keeping an asset from being unloaded
#[derive(Debug, Clone)]
pub struct AssetHandle {
    entry: Arc<AssetEntry>,
}

impl AssetHandle {
    /// The referenced asset
    pub fn id(&self) -> AssetId {
        self.entry.id
    }

    /// Check if the asset is resident
    pub fn is_ready(&self) -> bool {
        *self.entry.state.lock() == AssetState::Ready
    }
}

/// Notification that an asset became resident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetReadyEvent {
    /// The asset that finished loading
    pub asset: AssetId,
}

#[derive(Debug, Default)]
struct AssetTable {
    entries: HashMap<AssetId, Arc<AssetEntry>>,
    load_queue: VecDeque<AssetId>,
}

impl AssetTable {
    fn entry(&mut self, id: AssetId) -> Arc<AssetEntry> {
        self.entries
            .entry(id)
            .or_insert_with(|| {
                Arc::new(AssetEntry {
                    id,
                    state: Mutex::new(AssetState::Unloaded),
                })
            })
            .clone()
    }
}

/// Shared asset manager
///
/// Cloning is cheap; all clones see the same table.
#[derive(Debug, Clone, Default)]
pub struct AssetManager {
    inner: Arc<RwLock<AssetTable>>,
}

impl AssetManager {
    /// Create a new empty asset manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset that is not yet loaded
    pub fn register(&self, id: AssetId) {
        self.inner.write().entry(id);
    }

    /// Register an asset that is already resident
    pub fn register_resident(&self, id: AssetId) {
        let entry = self.inner.write().entry(id);
        *entry.state.lock() = AssetState::Ready;
    }

    /// Take a strong reference to an asset, registering it if unknown
    pub fn acquire(&self, id: AssetId) -> AssetHandle {
        AssetHandle {
            entry: self.inner.write().entry(id),
        }
    }

    /// Current residency of an asset
    pub fn state(&self, id: AssetId) -> AssetState {
        self.inner
            .read()
            .entries
            .get(&id)
            .map(|e| *e.state.lock())
            .unwrap_or_default()
    }

    /// Check if an asset is resident
    pub fn is_ready(&self, id: AssetId) -> bool {
        self.state(id) == AssetState::Ready
    }

    /// Request an asynchronous load
    ///
    /// Returns `true` if a new load was queued.
    pub fn request_load(&self, id: AssetId) -> bool {
        let mut table = self.inner.write();
        let entry = table.entry(id);
        let mut state = entry.state.lock();
        if *state != AssetState::Unloaded {
            return false;
        }
        *state = AssetState::Loading;
        drop(state);
        table.load_queue.push_back(id);
        tracing::debug!("Queued load for asset {id}");
        true
    }

    /// Mark an asset as removed from the project
    ///
    /// Its loads are dropped and later requests are refused.
    pub fn mark_missing(&self, id: AssetId) {
        let mut table = self.inner.write();
        table.load_queue.retain(|queued| *queued != id);
        let entry = table.entry(id);
        *entry.state.lock() = AssetState::Missing;
        tracing::warn!("Asset {id} is missing");
    }

    /// Check if any load is still in flight
    pub fn has_pending_loads(&self) -> bool {
        !self.inner.read().load_queue.is_empty()
    }

    /// Complete queued loads and return one ready event per finished asset
    pub fn pump_events(&self) -> Vec<AssetReadyEvent> {
        let mut table = self.inner.write();
        let mut events = Vec::new();
        while let Some(id) = table.load_queue.pop_front() {
            let entry = table.entry(id);
            let mut state = entry.state.lock();
            if *state == AssetState::Loading {
                *state = AssetState::Ready;
                events.push(AssetReadyEvent { asset: id });
            }
        }
        if !events.is_empty() {
            tracing::debug!("Asset pump delivered {} ready event(s)", events.len());
        }
        events
    }

    /// Number of outstanding strong references to an asset
    pub fn ref_count(&self, id: AssetId) -> usize {
        self.inner
            .read()
            .entries
            .get(&id)
            .map(|e| Arc::strong_count(e) - 1)
            .unwrap_or(0)
    }

    /// Unload every resident asset nobody references, returning the unloaded ids
    pub fn release_unreferenced(&self) -> Vec<AssetId> {
        let table = self.inner.read();
        let mut released = Vec::new();
        for (id, entry) in &table.entries {
            if Arc::strong_count(entry) > 1 {
                continue;
            }
            let mut state = entry.state.lock();
            if *state == AssetState::Ready {
                *state = AssetState::Unloaded;
                released.push(*id);
            }
        }
        if !released.is_empty() {
            tracing::debug!("Released {} unreferenced asset(s)", released.len());
        }
        released
    }
}
