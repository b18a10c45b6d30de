#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use logscope::{
    config::RemoteConfig,
    source::{FetchRequest, HttpSource},
    Event, ParsedEvent,
};
use tokio::net::TcpListener;

/// Stand-in for the capture server's `/getData`.
pub struct FakeRemote {
    pub events: Vec<Event>,
    pub calls: AtomicUsize,
}

impl FakeRemote {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn get_data(
    State(remote): State<Arc<FakeRemote>>,
    Json(req): Json<FetchRequest>,
) -> Json<Vec<Event>> {
    remote.calls.fetch_add(1, Ordering::SeqCst);
    Json(
        remote
            .events
            .iter()
            .filter(|e| e.epoch_ms >= req.start_epoch_ms && e.epoch_ms <= req.end_epoch_ms)
            .cloned()
            .collect(),
    )
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable")
}

async fn garbage() -> &'static str {
    "this is not json"
}

pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Serves `events` at `/getData`, plus `/broken/getData` (500) and `/garbage/getData` (bad body).
pub async fn spawn_remote(events: Vec<Event>) -> (SocketAddr, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote {
        events,
        calls: AtomicUsize::new(0),
    });
    let router = Router::new()
        .route("/getData", post(get_data))
        .route("/broken/getData", post(broken))
        .route("/garbage/getData", post(garbage))
        .with_state(remote.clone());
    (spawn(router).await, remote)
}

pub fn http_source(addr: SocketAddr, prefix: &str) -> HttpSource {
    HttpSource::new(&RemoteConfig {
        endpoint: format!("http://{addr}{prefix}"),
        timeout_secs: 5,
    })
    .unwrap()
}

pub fn reading(epoch_ms: i64, version: &str, pairs: &[(&str, f64)]) -> Event {
    Event::parsed(
        epoch_ms,
        ParsedEvent {
            program_id: "cup".into(),
            program_version: version.into(),
            device_config: "baud=115200".into(),
            reading_ids: pairs.iter().map(|(id, _)| id.to_string()).collect(),
            reading_values: pairs.iter().map(|(_, v)| *v).collect(),
            ..Default::default()
        },
    )
}

pub fn sample_events() -> Vec<Event> {
    vec![
        reading(100, "1", &[("temp", 20.0)]),
        Event::raw(150, "garbled"),
        reading(200, "1", &[("temp", 21.0), ("hum", 40.0)]),
        reading(12_000, "2", &[("temp", 22.5)]),
    ]
}
