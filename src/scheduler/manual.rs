//! Virtual-time scheduler.
//!
//! Time only moves through [`ManualScheduler::advance`], which walks the shared
//! [`ManualClock`] from one due tick to the next and fires callbacks in order,
//! so tests see exactly the clock values a real scheduler would deliver.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::error;

use super::{Scheduler, TickFn};
use crate::{
    clock::{Clock, ManualClock},
    utils::CancelGuard,
};

struct Entry {
    id: u64,
    period_ms: i64,
    next_due_ms: i64,
    tick: TickFn,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct Queue {
    entries: Vec<Entry>,
    next_id: u64,
}

/// Scheduler driven by a [`ManualClock`]. Clones share the same queue.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Arc<Mutex<Queue>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(Queue::default())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of live (not cancelled) schedules
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .map(|queue| {
                queue
                    .entries
                    .iter()
                    .filter(|e| !e.cancelled.load(Ordering::SeqCst))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Move time forward by `delta_ms`, firing every tick that falls due.
    pub fn advance(&self, delta_ms: i64) {
        let target = self.clock.now_ms() + delta_ms;

        while let Some((due_ms, tick)) = self.next_due(target) {
            self.clock.set(due_ms);
            // Queue is unlocked here: ticks may schedule or cancel
            tick();
        }

        self.clock.set(target);
    }

    /// Move time forward to an absolute instant
    pub fn advance_to(&self, now_ms: i64) {
        self.advance(now_ms - self.clock.now_ms());
    }

    fn next_due(&self, target: i64) -> Option<(i64, TickFn)> {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(e) => {
                error!("Manual scheduler queue poisoned: {}", e);
                return None;
            }
        };
        queue.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));

        let entry = queue
            .entries
            .iter_mut()
            .filter(|e| e.next_due_ms <= target)
            .min_by_key(|e| (e.next_due_ms, e.id))?;

        let due_ms = entry.next_due_ms;
        entry.next_due_ms += entry.period_ms;
        Some((due_ms, Arc::clone(&entry.tick)))
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, tick: TickFn) -> CancelGuard {
        let period_ms = (period.as_millis() as i64).max(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        match self.queue.lock() {
            Ok(mut queue) => {
                let id = queue.next_id;
                queue.next_id += 1;
                queue.entries.push(Entry {
                    id,
                    period_ms,
                    next_due_ms: self.clock.now_ms() + period_ms,
                    tick,
                    cancelled: Arc::clone(&cancelled),
                });
            }
            Err(e) => {
                error!("Manual scheduler queue poisoned: {}", e);
                return CancelGuard::noop();
            }
        }

        CancelGuard::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(scheduler: &ManualScheduler, seen: &Arc<Mutex<Vec<(char, i64)>>>, tag: char, ms: u64) -> CancelGuard {
        let sink = Arc::clone(seen);
        let clock = scheduler.clock().clone();
        scheduler.every(
            Duration::from_millis(ms),
            Arc::new(move || sink.lock().unwrap().push((tag, clock.now_ms()))),
        )
    }

    #[test]
    fn fires_in_time_order_at_due_instants() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _a = recording(&scheduler, &seen, 'a', 300);
        let _b = recording(&scheduler, &seen, 'b', 200);

        scheduler.advance(600);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![('b', 200), ('a', 300), ('b', 400), ('a', 600), ('b', 600)]
        );
        assert_eq!(scheduler.clock().now_ms(), 600);
    }

    #[test]
    fn cancelled_schedule_stops_firing() {
        let scheduler = ManualScheduler::new(ManualClock::new(1_000));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let guard = recording(&scheduler, &seen, 'a', 100);

        scheduler.advance(250);
        guard.cancel();
        scheduler.advance(1_000);

        assert_eq!(*seen.lock().unwrap(), vec![('a', 1_100), ('a', 1_200)]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tick_may_cancel_itself() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let count = Arc::new(Mutex::new(0));
        let slot: Arc<Mutex<Option<CancelGuard>>> = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&count);
        let own = Arc::clone(&slot);
        let guard = scheduler.every(
            Duration::from_millis(10),
            Arc::new(move || {
                *counter.lock().unwrap() += 1;
                own.lock().unwrap().take();
            }),
        );
        *slot.lock().unwrap() = Some(guard);

        scheduler.advance(100);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
