//! State management module
//!
//! Timer state types, the persisted snapshot and the state of the HTTP host.

pub mod app_state;
pub mod snapshot;
pub mod timer_state;

// Re-export main types
pub use app_state::{view_channel, AppState, ViewSender};
pub use snapshot::{PersistedSnapshot, SnapshotError, SNAPSHOT_VERSION};
pub use timer_state::{Anchor, RunState, TimerMode, TimerView};
