//! Persistence and cross-instance reconciliation

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Effects, Inner, Shared};
use crate::{
    clock::model,
    state::{PersistedSnapshot, RunState},
    storage::StorageError,
};

impl Shared {
    /// Write a snapshot. Failures are logged and reported, never raised.
    pub(super) fn persist(&self, snapshot: &PersistedSnapshot) {
        let Some(storage) = &self.storage else {
            return;
        };

        let raw = match snapshot.encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode timer snapshot: {}", e);
                return;
            }
        };

        match storage.set(&raw) {
            Ok(()) => debug!("Persisted {} snapshot", snapshot.run_state.as_str()),
            Err(e) => self.report(&e, "persist"),
        }
    }

    fn report(&self, error: &StorageError, action: &str) {
        warn!("Failed to {} timer snapshot: {}", action, error);
        if let Some(on_persist_error) = &self.on_persist_error {
            if self.is_disposed() {
                return;
            }
            on_persist_error(error);
        }
    }

    /// Load the stored snapshot, if any. Returns whether one was adopted.
    pub(super) fn restore(self: &Arc<Self>) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };

        let raw = match storage.get() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored timer snapshot");
                return false;
            }
            Err(e) => {
                self.report(&e, "read");
                return false;
            }
        };

        let snapshot = match PersistedSnapshot::decode(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Discarding unreadable timer snapshot: {}", e);
                if let Err(e) = storage.remove() {
                    self.report(&e, "remove");
                }
                return false;
            }
        };

        if snapshot.mode != self.config.mode {
            warn!(
                "Stored snapshot is a {} timer, configured as {}, not restoring",
                snapshot.mode.as_str(),
                self.config.mode.as_str()
            );
            return false;
        }

        info!("Restoring {} timer from storage", snapshot.run_state.as_str());
        let order = self.lock_write_order();
        let mut effects = {
            let mut inner = self.lock_inner();
            let now = self.clock.now_ms();
            self.adopt(&mut *inner, snapshot, now)
        };
        if snapshot.run_state == RunState::Ended {
            // Announced by the instance that ended it
            effects.ended = false;
        }
        // Only a restore that completed the timer has something new to write
        if let Some(snapshot) = &effects.persist {
            self.persist(snapshot);
        }
        drop(order);
        self.fire(effects);
        true
    }

    /// Subscribe to changes other instances write under the same key
    pub(super) fn follow_external_changes(self: &Arc<Self>) {
        let Some(storage) = &self.storage else {
            return;
        };

        let engine = Arc::downgrade(self);
        let subscription = storage.subscribe(Arc::new(move |raw| {
            if let Some(engine) = engine.upgrade() {
                engine.reconcile(raw);
            }
        }));

        match subscription {
            Some(subscription) => {
                let mut inner = self.lock_inner();
                if inner.disposed {
                    return;
                }
                inner.subscription = Some(subscription);
                info!("Following external timer changes");
            }
            None => warn!("Storage cannot report external changes, cross-instance sync disabled"),
        }
    }

    /// Adopt a snapshot written elsewhere when it is newer and different.
    ///
    /// Never writes: the writer already stored it, and writing back would make
    /// instances echo each other.
    pub(super) fn reconcile(self: &Arc<Self>, raw: Option<String>) {
        let Some(raw) = raw else {
            debug!("Stored timer removed externally, ignoring");
            return;
        };

        let incoming = match PersistedSnapshot::decode(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring malformed external snapshot: {}", e);
                return;
            }
        };
        if incoming.mode != self.config.mode {
            warn!("Ignoring external snapshot of a {} timer", incoming.mode.as_str());
            return;
        }

        // Only the state lock: the writer may hold its own write lock while
        // delivering this change, and may be waiting on ours.
        let effects = {
            let mut inner = self.lock_inner();
            if inner.disposed {
                return;
            }

            let local = self.snapshot_of(&inner);
            if !incoming.differs_from(&local) {
                debug!("External snapshot matches local state");
                return;
            }
            if incoming.is_stale_against(&local) {
                debug!(
                    "Ignoring stale external snapshot (saved {} < {} or regressing)",
                    incoming.saved_at_ms, local.saved_at_ms
                );
                return;
            }

            info!(
                "Adopting external {} snapshot",
                incoming.run_state.as_str()
            );
            let now = self.clock.now_ms();
            self.adopt(&mut *inner, incoming, now)
        };
        self.fire(effects);
    }

    /// Replace local state with `snapshot` wholesale and recompute at `now`
    fn adopt(self: &Arc<Self>, inner: &mut Inner, snapshot: PersistedSnapshot, now: i64) -> Effects {
        let was_ended = inner.run_state == RunState::Ended;
        let mode = self.config.mode;

        inner.cancel_ticks();
        inner.run_state = snapshot.run_state;
        inner.anchor = snapshot.anchor;
        inner.duration_ms = snapshot.duration_ms;
        inner.frozen_ms = snapshot.frozen_ms;
        inner.saved_at_ms = snapshot.saved_at_ms;

        if snapshot.run_state == RunState::Running {
            let reading = self.read(inner, now);
            if reading.ended {
                let mut effects = self.finish(inner, reading, now);
                effects.ended = !was_ended;
                return effects;
            }
            inner.reading = reading;
            self.arm_ticks(inner);
            return Effects {
                tick_value: Some(reading.value_ms),
                ..Effects::default()
            };
        }

        let ended = snapshot.run_state == RunState::Ended;
        let frozen = snapshot.frozen_ms.unwrap_or(0);
        inner.reading = model::frozen(mode, frozen, snapshot.duration_ms, ended);
        Effects {
            tick_value: Some(inner.reading.value_ms),
            ended: ended && !was_ended,
            persist: None,
        }
    }
}
