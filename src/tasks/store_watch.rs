//! Store watch background task

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::storage::{file::read_value, ChangeListener};

/// Poll a storage file and report content that differs from what this process
/// last wrote or saw.
///
/// `last_seen` is shared with the owning adapter, which updates it on every
/// write, so the adapter's own writes are never reported back.
pub async fn store_watch_task(
    path: PathBuf,
    poll_interval: Duration,
    last_seen: Arc<Mutex<Option<String>>>,
    listener: ChangeListener,
) {
    info!("Watching {} for external changes", path.display());

    let mut interval = interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        // Read under the adapter's lock: a write in progress finishes and is
        // recorded before we look at the file
        let change = {
            let mut last = match last_seen.lock() {
                Ok(last) => last,
                Err(e) => {
                    warn!("Store watch state poisoned: {}", e);
                    continue;
                }
            };
            match read_value(&path) {
                Ok(current) if *last != current => {
                    *last = current.clone();
                    Some(current)
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to poll {}: {}", path.display(), e);
                    None
                }
            }
        };

        // Listener runs unlocked: it may write through the same adapter
        if let Some(current) = change {
            debug!("External change detected in {}", path.display());
            listener(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{FileStorage, StorageAdapter};
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    #[tokio::test]
    async fn reports_other_process_writes_but_not_own() {
        let dir = tempfile::tempdir().unwrap();
        let ours = FileStorage::new(dir.path(), "timer").with_poll_interval(Duration::from_millis(10));
        let theirs = FileStorage::new(dir.path(), "timer");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _guard = ours
            .subscribe(Arc::new(move |value| sink.lock().unwrap().push(value)))
            .unwrap();

        ours.set("mine").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(seen.lock().unwrap().is_empty());

        theirs.set("theirs").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*seen.lock().unwrap(), vec![Some("theirs".to_string())]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn own_writes_racing_the_poll_are_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ours = FileStorage::new(dir.path(), "timer").with_poll_interval(Duration::from_millis(1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _guard = ours
            .subscribe(Arc::new(move |value| sink.lock().unwrap().push(value)))
            .unwrap();

        let writer = ours.clone();
        tokio::task::spawn_blocking(move || {
            for n in 0..2_000 {
                writer.set(&format!("value-{n}")).unwrap();
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(seen.lock().unwrap().is_empty());
    }
}
