//! Scheduler module
//!
//! The engine only needs "call this no earlier than every N, until cancelled".
//! [`TokioScheduler`] provides it in real time, [`ManualScheduler`] in virtual
//! time driven by a [`ManualClock`](crate::clock::ManualClock).

pub mod manual;
pub mod tokio_interval;

use std::{sync::Arc, time::Duration};

use crate::utils::CancelGuard;

// Re-export main types
pub use manual::ManualScheduler;
pub use tokio_interval::TokioScheduler;

/// Callback invoked on every tick
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Cancelable repeating scheduler
pub trait Scheduler: Send + Sync {
    /// Invoke `tick` every `interval`, first one interval from now, until the
    /// returned guard is cancelled or dropped.
    fn every(&self, interval: Duration, tick: TickFn) -> CancelGuard;
}
