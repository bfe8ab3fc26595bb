//! HTTP surface driven in-process with `tower::ServiceExt::oneshot`

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use anchor_timer::{
    api::create_router,
    engine::{PersistOptions, TimerEngine, TimerOptions, TimerRuntime},
    scheduler::ManualScheduler,
    state::{view_channel, AppState},
    storage::MemoryStore,
};

struct Harness {
    state: Arc<AppState>,
    scheduler: ManualScheduler,
    store: MemoryStore,
}

impl Harness {
    fn new(options: TimerOptions) -> Self {
        let store = MemoryStore::new();
        let (runtime, scheduler) = TimerRuntime::manual(1_000_000);

        let view_tx = view_channel();
        let ticks = Arc::clone(&view_tx);
        let options = options
            .on_tick(move |value_ms| ticks.send_modify(|view| view.value_ms = value_ms))
            .persist(PersistOptions::new("api").adapter(store.adapter("api")));

        let timer = TimerEngine::new(options, runtime);
        let state = Arc::new(AppState::new(
            timer,
            view_tx,
            "api".to_string(),
            20554,
            "127.0.0.1".to_string(),
        ));
        Self {
            state,
            scheduler,
            store,
        }
    }

    fn app(&self) -> Router {
        create_router(Arc::clone(&self.state))
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(self.app(), request).await
    }

    async fn post(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method("POST").uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(self.app(), request).await
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_version() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn idle_timer_view() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (status, body) = harness.get("/timer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valueMs"], 60_000);
    assert_eq!(body["running"], false);
    assert_eq!(body["ended"], false);
    assert_eq!(body["mode"], "countdown");
    assert_eq!(body["runState"], "idle");
}

#[tokio::test]
async fn start_pause_and_resume() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (status, body) = harness.post("/timer/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["message"], "Timer started");

    harness.scheduler.advance(15_000);
    let (_, body) = harness.post("/timer/pause", None).await;
    assert_eq!(body["status"], "paused");
    assert_eq!(body["timer"]["valueMs"], 45_000);

    harness.scheduler.advance(60_000);
    let (_, body) = harness.get("/timer").await;
    assert_eq!(body["valueMs"], 45_000);

    let (_, body) = harness.post("/timer/start", None).await;
    assert_eq!(body["timer"]["running"], true);
    assert_eq!(body["timer"]["valueMs"], 45_000);
}

#[tokio::test]
async fn start_accepts_a_duration() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (_, body) = harness
        .post("/timer/start", Some(json!({ "durationMs": 5_000 })))
        .await;
    assert_eq!(body["timer"]["valueMs"], 5_000);
    assert_eq!(body["timer"]["durationMs"], 5_000);

    harness.scheduler.advance(5_000);
    let (_, body) = harness.get("/timer").await;
    assert_eq!(body["ended"], true);
    assert_eq!(body["runState"], "ended");
    assert_eq!(body["valueMs"], 0);
}

#[tokio::test]
async fn start_with_past_end_reports_ended() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (_, body) = harness
        .post("/timer/start", Some(json!({ "endAtMs": 999_000 })))
        .await;
    assert_eq!(body["status"], "ended");
    assert_eq!(body["message"], "Timer started and already ended");
}

#[tokio::test]
async fn pause_when_idle_keeps_state() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (_, body) = harness.post("/timer/pause", None).await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["message"], "Timer paused");
    assert_eq!(body["timer"]["valueMs"], 60_000);
}

#[tokio::test]
async fn reset_with_new_duration() {
    let harness = Harness::new(TimerOptions::countdown(60_000).auto_start(true));
    harness.scheduler.advance(10_000);

    let (_, body) = harness
        .post("/timer/reset", Some(json!({ "durationMs": 90_000 })))
        .await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["timer"]["valueMs"], 90_000);
    assert_eq!(harness.scheduler.pending(), 0);
}

#[tokio::test]
async fn countup_view_has_no_progress_without_duration() {
    let harness = Harness::new(TimerOptions::countup().auto_start(true));
    harness.scheduler.advance(3_000);

    let (_, body) = harness.get("/timer").await;
    assert_eq!(body["mode"], "countup");
    assert_eq!(body["valueMs"], 3_000);
    assert!(body["progress"].is_null());
}

#[tokio::test]
async fn status_records_last_action() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (_, body) = harness.get("/status").await;
    assert_eq!(body["key"], "api");
    assert_eq!(body["port"], 20554);
    assert!(body["last_action"].is_null());

    harness.post("/timer/start", None).await;
    let (_, body) = harness.get("/status").await;
    assert_eq!(body["last_action"], "start");
    assert_eq!(body["timer"]["runState"], "running");
}

#[tokio::test]
async fn actions_are_persisted() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    harness.post("/timer/start", None).await;
    let stored: Value = serde_json::from_str(&harness.store.raw("api").unwrap()).unwrap();
    assert_eq!(stored["runState"], "running");
    assert_eq!(stored["endAtMs"], 1_060_000);
}

#[tokio::test(start_paused = true)]
async fn next_returns_after_a_change() {
    let harness = Harness::new(TimerOptions::countdown(60_000));
    let app = harness.app();

    let waiting = tokio::spawn(async move {
        let request = Request::builder()
            .uri("/timer/next?timeoutMs=10000")
            .body(Body::empty())
            .unwrap();
        send(app, request).await
    });
    tokio::task::yield_now().await;

    harness.post("/timer/start", None).await;
    let (status, body) = waiting.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runState"], "running");
}

#[tokio::test(start_paused = true)]
async fn next_times_out_with_current_view() {
    let harness = Harness::new(TimerOptions::countdown(60_000));

    let (status, body) = harness.get("/timer/next?timeoutMs=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runState"], "idle");
}
