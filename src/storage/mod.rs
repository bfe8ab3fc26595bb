//! Storage module
//!
//! The engine persists through a [`StorageAdapter`] bound to a single key and
//! never assumes a backend. Two backends ship with the crate: an in-memory
//! store whose adapters notify each other like browser tabs do, and a file store
//! that serves as the default.

pub mod file;
pub mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::utils::CancelGuard;

// Re-export main types
pub use file::FileStorage;
pub use memory::{MemoryAdapter, MemoryStore};

/// Callback for a value written by someone else. `None` means the key was removed.
pub type ChangeListener = Arc<dyn Fn(Option<String>) + Send + Sync>;

/// Persistence failure reported by an adapter
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-bound get/set/remove contract plus an optional change feed.
pub trait StorageAdapter: Send + Sync {
    fn get(&self) -> Result<Option<String>, StorageError>;

    fn set(&self, value: &str) -> Result<(), StorageError>;

    fn remove(&self) -> Result<(), StorageError>;

    /// Subscribe to changes made through other adapters or processes.
    ///
    /// Own writes are never reported. Returns `None` when the backend cannot
    /// observe external changes.
    fn subscribe(&self, _listener: ChangeListener) -> Option<CancelGuard> {
        None
    }
}
