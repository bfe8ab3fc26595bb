//! Anchor Timer - wall-clock anchored timers that survive restarts
//!
//! A timer counts down toward zero or up from zero. Its value is always derived
//! from an absolute anchor timestamp, so it stays correct across suspend and
//! slow ticks. State can be persisted under a key and kept in sync between
//! several instances sharing that key.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::{PersistOptions, ResetOptions, StartOptions, TimerEngine, TimerOptions, TimerRuntime};
pub use state::{RunState, TimerMode, TimerView};
pub use api::create_router;
