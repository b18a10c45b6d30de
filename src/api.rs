use std::{error::Error, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    cache::LogCache,
    error::{FetchError, QueryError},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRequest {
    pub serial_number: String,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRequest {
    pub serial_number: String,
    pub reading_ids: Vec<String>,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub serial_number: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(cache: Arc<LogCache>) -> Router {
    Router::new()
        .route("/ensureLoaded", post(ensure_loaded))
        .route("/reload", post(reload))
        .route("/timeline", post(timeline))
        .route("/readings", post(readings))
        .route("/readingsValues", post(readings_values))
        .route("/stats", post(stats))
        .with_state(cache)
}

pub async fn serve(listen: &str, cache: Arc<LogCache>) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(listen).await?;
    info!("query api listening on {}", listener.local_addr()?);

    axum::serve(listener, router(cache).into_make_service()).await?;
    Ok(())
}

fn fetch_failed(e: FetchError) -> Response {
    (StatusCode::BAD_GATEWAY, Json(e)).into_response()
}

fn bad_query(e: QueryError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn ensure_loaded(
    State(cache): State<Arc<LogCache>>,
    Json(req): Json<RangeRequest>,
) -> Response {
    match cache
        .ensure_loaded(&req.serial_number, req.start_epoch_ms, req.end_epoch_ms)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => fetch_failed(e),
    }
}

async fn reload(State(cache): State<Arc<LogCache>>, Json(req): Json<RangeRequest>) -> Response {
    match cache
        .reload(&req.serial_number, req.start_epoch_ms, req.end_epoch_ms)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => fetch_failed(e),
    }
}

async fn timeline(State(cache): State<Arc<LogCache>>, Json(req): Json<RangeRequest>) -> Response {
    match cache.timeline(&req.serial_number, req.start_epoch_ms, req.end_epoch_ms) {
        Ok(points) => Json(points).into_response(),
        Err(e) => bad_query(e),
    }
}

async fn readings(
    State(cache): State<Arc<LogCache>>,
    Json(req): Json<RangeRequest>,
) -> impl IntoResponse {
    Json(cache.distinct_readings(&req.serial_number, req.start_epoch_ms, req.end_epoch_ms))
}

async fn readings_values(
    State(cache): State<Arc<LogCache>>,
    Json(req): Json<SeriesRequest>,
) -> impl IntoResponse {
    Json(cache.multi_reading_series(
        &req.serial_number,
        &req.reading_ids,
        req.start_epoch_ms,
        req.end_epoch_ms,
    ))
}

async fn stats(State(cache): State<Arc<LogCache>>, Json(req): Json<DeviceRequest>) -> Response {
    match cache.stats(&req.serial_number) {
        Some(stats) => Json(stats).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown device `{}`", req.serial_number),
            }),
        )
            .into_response(),
    }
}
