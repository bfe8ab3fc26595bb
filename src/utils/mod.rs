//! Utility module
//!
//! Small building blocks shared by the scheduler, storage and binary.

pub mod cancel;
pub mod signals;

// Re-export main items
pub use cancel::CancelGuard;
pub use signals::shutdown_signal;
