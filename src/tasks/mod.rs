//! Background tasks module
//!
//! This module contains background tasks spawned on the tokio runtime.

pub mod store_watch;

// Re-export main functions
pub use store_watch::store_watch_task;
