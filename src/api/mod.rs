//! HTTP and WebSocket surface over the ingestion pipeline.

mod handlers;
mod live;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::error::IngestError;
use crate::hub::BroadcastHub;
use crate::processor::IngestionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub hub: BroadcastHub,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/points", post(handlers::ingest_point))
        .route("/trips", post(handlers::trip_action))
        .route("/vehicles/:vehicle_id/location", get(handlers::current_location))
        .route("/vehicles/:vehicle_id/locations", get(handlers::location_history))
        .route(
            "/companies/:company_id/geofences",
            get(handlers::list_geofences).post(handlers::create_geofence),
        )
        .route(
            "/companies/:company_id/geofences/:geofence_id",
            put(handlers::update_geofence).delete(handlers::delete_geofence),
        )
        .route("/ws", get(live::subscribe))
        .with_state(state)
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            IngestError::Validation(_) | IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::Conflict(_) => StatusCode::CONFLICT,
            IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
            "stored": self.point_stored(),
        });
        (status, Json(body)).into_response()
    }
}

// Extractor failures answer with the same error body as pipeline rejections.
impl From<PathRejection> for IngestError {
    fn from(e: PathRejection) -> Self {
        IngestError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for IngestError {
    fn from(e: QueryRejection) -> Self {
        IngestError::BadRequest(e.body_text())
    }
}

impl From<JsonRejection> for IngestError {
    fn from(e: JsonRejection) -> Self {
        IngestError::BadRequest(e.body_text())
    }
}
