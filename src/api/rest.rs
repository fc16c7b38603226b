use axum::{
    Router,
    routing::get,
    extract::{Query, State, Json},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use crate::error::ErrorCode;
use crate::observability::metrics::gather_text;
use crate::service::tso::{GetTimestampResponse, GetTimestampsResponse, TsoService, TsoStatus};

pub fn create_router(service: Arc<TsoService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/timestamp", get(get_timestamp))
        .route("/timestamps", get(get_timestamps))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .with_state(service)
}

async fn health_check() -> &'static str {
    "OK"
}

fn status_for(error: Option<ErrorCode>) -> StatusCode {
    match error {
        None => StatusCode::OK,
        Some(ErrorCode::BatchTooLarge) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::TimestampNotFound) | Some(ErrorCode::LogicalClockOverflow) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Some(ErrorCode::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_timestamp(
    State(service): State<Arc<TsoService>>,
) -> (StatusCode, Json<GetTimestampResponse>) {
    let response = service.get_timestamp_response();
    (status_for(response.error), Json(response))
}

#[derive(Deserialize)]
struct BatchQuery {
    #[serde(default)]
    size: u32,
}

async fn get_timestamps(
    State(service): State<Arc<TsoService>>,
    Query(query): Query<BatchQuery>,
) -> (StatusCode, Json<GetTimestampsResponse>) {
    let response = service.get_timestamps_response(query.size);
    (status_for(response.error), Json(response))
}

async fn get_status(
    State(service): State<Arc<TsoService>>,
) -> Json<TsoStatus> {
    Json(service.status())
}

async fn get_metrics() -> Result<String, StatusCode> {
    gather_text().map_err(|e| {
        tracing::error!("Failed to render metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
