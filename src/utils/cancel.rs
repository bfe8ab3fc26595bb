//! Drop-to-cancel handle shared by scheduled ticks and storage subscriptions

use std::fmt;

/// Handle to something that runs until cancelled.
///
/// Cancelling happens at most once, either explicitly through [`CancelGuard::cancel`]
/// or implicitly when the guard is dropped.
pub struct CancelGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelGuard {
    /// Create a guard that runs `cancel` when cancelled or dropped
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Create a guard with nothing to cancel
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancel now
    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelGuard")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn cancels_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let guard = CancelGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        guard.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        {
            let _guard = CancelGuard::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
