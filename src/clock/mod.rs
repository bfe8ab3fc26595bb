//! Clock module
//!
//! The pure clock model plus the injectable wall-clock sources it is fed from.

pub mod model;
pub mod source;

// Re-export main types
pub use model::{ClockInput, ClockReading};
pub use source::{Clock, ManualClock, SystemClock};
