//! Timers surviving a restart, and processes sharing a storage directory

use std::time::Duration;

use anchor_timer::{
    engine::{PersistOptions, StartOptions, TimerEngine, TimerOptions, TimerRuntime},
    state::RunState,
    storage::FileStorage,
};

fn file_persist(dir: &std::path::Path, cross_tab: bool) -> PersistOptions {
    PersistOptions::new("focus")
        .adapter(FileStorage::new(dir, "focus").with_poll_interval(Duration::from_millis(10)))
        .cross_tab(cross_tab)
}

#[test]
fn running_countdown_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, scheduler) = TimerRuntime::manual(0);

    let before = {
        let timer = TimerEngine::new(
            TimerOptions::countdown(60_000).persist(file_persist(dir.path(), false)),
            runtime.clone(),
        );
        timer.start(StartOptions::default());
        scheduler.advance(12_345);
        timer.refresh();
        timer.view()
    };
    assert_eq!(before.value_ms, 47_655);
    assert_eq!(scheduler.pending(), 0);

    // Same instant: identical view
    let timer = TimerEngine::new(
        TimerOptions::countdown(60_000).persist(file_persist(dir.path(), false)),
        runtime.clone(),
    );
    assert_eq!(timer.view(), before);

    // Later: the anchor kept running while nobody was watching
    drop(timer);
    scheduler.advance(7_655);
    let timer = TimerEngine::new(
        TimerOptions::countdown(60_000).persist(file_persist(dir.path(), false)),
        runtime,
    );
    assert_eq!(timer.value_ms(), 40_000);
    assert!(timer.running());
}

#[test]
fn paused_countup_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, scheduler) = TimerRuntime::manual(500);

    {
        let timer = TimerEngine::new(
            TimerOptions::countup().auto_start(true).persist(file_persist(dir.path(), false)),
            runtime.clone(),
        );
        scheduler.advance(8_000);
        timer.pause();
    }
    scheduler.advance(3_600_000);

    let timer = TimerEngine::new(
        TimerOptions::countup().auto_start(true).persist(file_persist(dir.path(), false)),
        runtime,
    );
    assert_eq!(timer.run_state(), RunState::Paused);
    assert_eq!(timer.value_ms(), 8_000);

    timer.start(StartOptions::default());
    scheduler.advance(2_000);
    assert_eq!(timer.value_ms(), 10_000);
}

#[test]
fn countdown_that_expired_while_stopped_ends_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, scheduler) = TimerRuntime::manual(0);

    drop(TimerEngine::new(
        TimerOptions::countdown(10_000).auto_start(true).persist(file_persist(dir.path(), false)),
        runtime.clone(),
    ));
    scheduler.advance(60_000);

    let ends = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&ends);
    let timer = TimerEngine::new(
        TimerOptions::countdown(10_000)
            .persist(file_persist(dir.path(), false))
            .on_end(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        runtime.clone(),
    );
    assert!(timer.ended());
    assert_eq!(timer.value_ms(), 0);
    assert_eq!(ends.load(std::sync::atomic::Ordering::SeqCst), 1);

    // The ended state was written back, so the next start does not announce again
    drop(timer);
    let timer = TimerEngine::new(
        TimerOptions::countdown(10_000).persist(file_persist(dir.path(), false)),
        runtime,
    );
    assert!(timer.ended());
}

#[tokio::test]
async fn processes_sharing_a_directory_follow_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, scheduler) = TimerRuntime::manual(0);

    let a = TimerEngine::new(
        TimerOptions::countdown(60_000).auto_start(true).persist(file_persist(dir.path(), true)),
        runtime.clone(),
    );
    let b = TimerEngine::new(
        TimerOptions::countdown(60_000).persist(file_persist(dir.path(), true)),
        runtime,
    );
    assert!(b.running());

    scheduler.advance(25_000);
    a.pause();

    let mut waited = 0;
    while b.running() && waited < 2_000 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 10;
    }

    assert_eq!(b.run_state(), RunState::Paused);
    assert_eq!(b.value_ms(), 35_000);
}
