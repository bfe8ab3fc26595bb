//! In-memory key-value store shared by several adapters.
//!
//! Each [`MemoryAdapter`] plays the role of one tab: its writes are delivered
//! to the listeners of every other adapter on the same key, never to its own.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tracing::{debug, error};

use super::{ChangeListener, StorageAdapter, StorageError};
use crate::utils::CancelGuard;

#[derive(Default)]
struct StoreInner {
    values: HashMap<String, String>,
    listeners: Vec<Listener>,
    failing: bool,
}

struct Listener {
    id: u64,
    key: String,
    origin: u64,
    callback: ChangeListener,
}

/// Shared storage area. Clones refer to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter bound to `key`, acting as a separate writer
    pub fn adapter(&self, key: &str) -> MemoryAdapter {
        MemoryAdapter {
            store: self.clone(),
            key: key.to_string(),
            origin: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Read a key directly
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.values.get(key).cloned())
    }

    /// Make every adapter operation fail, to exercise error paths
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing = failing;
        }
    }

    fn write(&self, key: &str, origin: u64, value: Option<&str>) -> Result<(), StorageError> {
        let listeners: Vec<ChangeListener> = {
            let mut inner = self.lock()?;
            if inner.failing {
                return Err(StorageError::Unavailable("memory store is failing".to_string()));
            }
            match value {
                Some(value) => inner.values.insert(key.to_string(), value.to_string()),
                None => inner.values.remove(key),
            };
            inner
                .listeners
                .iter()
                .filter(|l| l.key == key && l.origin != origin)
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };

        // Delivered with the store unlocked so listeners may read or write again
        debug!("Delivering change of {} to {} listeners", key, listeners.len());
        for listener in listeners {
            listener(value.map(str::to_string));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StorageError> {
        self.inner.lock().map_err(|e| {
            error!("Memory store lock poisoned: {}", e);
            StorageError::Unavailable(format!("Failed to lock memory store: {}", e))
        })
    }
}

/// One writer's view of a [`MemoryStore`] key
#[derive(Clone)]
pub struct MemoryAdapter {
    store: MemoryStore,
    key: String,
    origin: u64,
}

impl MemoryAdapter {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl StorageAdapter for MemoryAdapter {
    fn get(&self) -> Result<Option<String>, StorageError> {
        let inner = self.store.lock()?;
        if inner.failing {
            return Err(StorageError::Unavailable("memory store is failing".to_string()));
        }
        Ok(inner.values.get(&self.key).cloned())
    }

    fn set(&self, value: &str) -> Result<(), StorageError> {
        self.store.write(&self.key, self.origin, Some(value))
    }

    fn remove(&self) -> Result<(), StorageError> {
        self.store.write(&self.key, self.origin, None)
    }

    fn subscribe(&self, listener: ChangeListener) -> Option<CancelGuard> {
        let id = self.store.next_id.fetch_add(1, Ordering::SeqCst);
        self.store.lock().ok()?.listeners.push(Listener {
            id,
            key: self.key.clone(),
            origin: self.origin,
            callback: listener,
        });

        let inner = Arc::clone(&self.store.inner);
        Some(CancelGuard::new(move || {
            if let Ok(mut inner) = inner.lock() {
                inner.listeners.retain(|l| l.id != id);
            }
        }))
    }
}
