// src/run/registry.rs

//! Directory of active runs, keyed by run identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::{LogSettings, SweepPolicy};
use crate::sweeper::spawn_sweeper;
use crate::types::RunId;

use super::RunEntry;

#[derive(Debug, Default)]
struct RegistryInner {
    runs: HashMap<RunId, Arc<RunEntry>>,
    /// True while a sweeper task owns this registry.
    sweeper_active: bool,
    /// The sweeper task, to notice one that died without clearing the flag
    /// (e.g. its runtime shut down).
    sweeper: Option<AbortHandle>,
}

impl RegistryInner {
    fn sweeper_running(&self) -> bool {
        self.sweeper_active && self.sweeper.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// The single source of truth for which runs exist.
///
/// The map is guarded by its own lock, independent of any entry's lock; the
/// registry never locks an entry while holding it, so lookups do not wait on
/// log activity.
#[derive(Debug)]
pub struct RunRegistry {
    inner: Mutex<RegistryInner>,
    settings: LogSettings,
    policy: SweepPolicy,
    dropped_writes: Arc<AtomicU64>,
}

impl RunRegistry {
    pub fn new(settings: LogSettings, policy: SweepPolicy) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner::default()),
            settings,
            policy,
            dropped_writes: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    /// Allocate a fresh entry, register it and make sure a sweeper runs.
    ///
    /// Insertion and the sweeper check happen under the registry lock, the
    /// same lock the sweeper holds when it decides to exit on an empty
    /// registry, so a new run is never left without a sweeper.
    pub fn create(self: &Arc<Self>, argv: Vec<String>) -> Arc<RunEntry> {
        let entry = Arc::new(RunEntry::new(
            argv,
            &self.settings,
            Arc::clone(&self.dropped_writes),
        ));

        let mut inner = self.inner.lock();
        inner.runs.insert(entry.id(), Arc::clone(&entry));
        debug!(run_id = %entry.id(), runs = inner.runs.len(), "run registered");

        if !inner.sweeper_running() {
            if inner.sweeper_active {
                warn!("sweeper task ended without releasing the registry; restarting it");
            }
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    inner.sweeper_active = true;
                    inner.sweeper = Some(spawn_sweeper(&handle, Arc::downgrade(self)));
                }
                Err(e) => {
                    warn!(error = %e, "no tokio runtime available; sweeper not started");
                }
            }
        }

        entry
    }

    pub fn get(&self, id: &RunId) -> Option<Arc<RunEntry>> {
        self.inner.lock().runs.get(id).cloned()
    }

    /// Unregister an entry. Disposal is the caller's job (the sweeper).
    pub fn remove(&self, id: &RunId) -> Option<Arc<RunEntry>> {
        self.inner.lock().runs.remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().runs.is_empty()
    }

    pub fn ids(&self) -> Vec<RunId> {
        self.inner.lock().runs.keys().copied().collect()
    }

    /// The entry with the oldest `last_access`, if any.
    ///
    /// Entries are copied out under the registry lock and inspected after it
    /// is released.
    pub fn oldest(&self) -> Option<Arc<RunEntry>> {
        let entries: Vec<Arc<RunEntry>> = self.inner.lock().runs.values().cloned().collect();
        entries.into_iter().min_by_key(|entry| entry.last_access())
    }

    /// Whether a live sweeper task currently owns this registry.
    pub fn sweeper_active(&self) -> bool {
        self.inner.lock().sweeper_running()
    }

    /// Called by the sweeper: if no runs remain, mark the sweeper as gone
    /// and return true so it can exit.
    pub(crate) fn release_sweeper_if_empty(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.runs.is_empty() {
            inner.sweeper_active = false;
            inner.sweeper = None;
            true
        } else {
            false
        }
    }

    /// Number of writes rejected because their run's log had been disposed.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }
}
