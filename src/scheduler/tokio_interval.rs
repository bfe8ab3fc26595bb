//! Real-time scheduler on the tokio runtime

use std::time::Duration;
use tokio::{
    runtime::Handle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

use super::{Scheduler, TickFn};
use crate::utils::CancelGuard;

/// Spawns one interval task per schedule; cancelling aborts the task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler on the runtime of the calling task, if there is one
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, tick: TickFn) -> CancelGuard {
        let task = self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            // A stalled process catches up with one tick, not a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });
        debug!("Scheduled tick every {:?}", period);
        CancelGuard::new(move || task.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let guard = scheduler.every(
            Duration::from_millis(100),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        guard.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn no_scheduler_outside_a_runtime() {
        assert!(TokioScheduler::try_current().is_none());
    }
}
