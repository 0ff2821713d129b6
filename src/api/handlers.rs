use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::AppState;
use crate::error::IngestError;
use crate::models::{
    Geofence, GeofenceInput, GpsPoint, HistoryPage, HistoryQuery, Trip, TripActionRequest,
};
use crate::processor::IngestOutcome;

type ApiResult<T> = Result<T, IngestError>;

// Extractors are taken as `Result` so their rejections go through `IngestError`.
type PathArg<T> = Result<Path<T>, PathRejection>;
type QueryArg<T> = Result<Query<T>, QueryRejection>;
type JsonArg<T> = Result<Json<T>, JsonRejection>;

pub async fn ingest_point(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestOutcome>)> {
    let outcome = state.pipeline.process_payload(&body).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn trip_action(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Trip>> {
    let request: TripActionRequest = serde_json::from_slice(&body)
        .map_err(|e| IngestError::BadRequest(format!("malformed trip request: {}", e)))?;
    Ok(Json(state.pipeline.process_trip(request).await?))
}

pub async fn current_location(
    State(state): State<AppState>,
    vehicle_id: PathArg<Uuid>,
) -> ApiResult<Json<GpsPoint>> {
    let Path(vehicle_id) = vehicle_id?;
    Ok(Json(state.pipeline.current_location(vehicle_id).await?))
}

pub async fn location_history(
    State(state): State<AppState>,
    vehicle_id: PathArg<Uuid>,
    query: QueryArg<HistoryQuery>,
) -> ApiResult<Json<HistoryPage>> {
    let Path(vehicle_id) = vehicle_id?;
    let Query(query) = query?;
    Ok(Json(state.pipeline.location_history(vehicle_id, &query).await?))
}

pub async fn list_geofences(
    State(state): State<AppState>,
    company_id: PathArg<Uuid>,
) -> ApiResult<Json<Vec<Geofence>>> {
    let Path(company_id) = company_id?;
    Ok(Json(state.pipeline.list_geofences(company_id).await?))
}

pub async fn create_geofence(
    State(state): State<AppState>,
    company_id: PathArg<Uuid>,
    input: JsonArg<GeofenceInput>,
) -> ApiResult<(StatusCode, Json<Geofence>)> {
    let Path(company_id) = company_id?;
    let Json(input) = input?;
    let fence = state.pipeline.create_geofence(company_id, input).await?;
    Ok((StatusCode::CREATED, Json(fence)))
}

pub async fn update_geofence(
    State(state): State<AppState>,
    ids: PathArg<(Uuid, Uuid)>,
    input: JsonArg<GeofenceInput>,
) -> ApiResult<Json<Geofence>> {
    let Path((company_id, geofence_id)) = ids?;
    let Json(input) = input?;
    Ok(Json(
        state
            .pipeline
            .update_geofence(company_id, geofence_id, input)
            .await?,
    ))
}

pub async fn delete_geofence(
    State(state): State<AppState>,
    ids: PathArg<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let Path((company_id, geofence_id)) = ids?;
    state
        .pipeline
        .delete_geofence(company_id, geofence_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
