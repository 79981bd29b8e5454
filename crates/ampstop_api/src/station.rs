use ampstop_core::{Station, StationAvailability, StationStatus};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SharedEngine, charging_error_to_response};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationsResponse {
    pub stations: Vec<StationAvailability>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationResponse {
    pub station: Station,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatusRequest {
    pub status: StationStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct StationQuery {
    /// Station id or code
    pub station: Option<String>,
}

/// Get every station with its availability right now
pub async fn list_stations(
    State(engine): State<SharedEngine>,
    Query(query): Query<StationQuery>,
) -> impl IntoResponse {
    tracing::debug!(filter = ?query.station, "Resolving station availability");
    match engine.stations().availability(query.station.as_deref()).await {
        Ok(stations) => (StatusCode::OK, Json(StationsResponse { stations })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

/// Add a station or replace one with the same id
pub async fn upsert_station(
    State(engine): State<SharedEngine>,
    Json(station): Json<Station>,
) -> impl IntoResponse {
    match engine.stations().upsert(station).await {
        Ok(station) => (StatusCode::OK, Json(StationResponse { station })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

pub async fn set_station_status(
    State(engine): State<SharedEngine>,
    Path(station_id): Path<Uuid>,
    Json(payload): Json<StationStatusRequest>,
) -> impl IntoResponse {
    match engine.stations().set_status(station_id, payload.status).await {
        Ok(station) => (StatusCode::OK, Json(StationResponse { station })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

pub async fn remove_station(
    State(engine): State<SharedEngine>,
    Path(station_id): Path<Uuid>,
) -> impl IntoResponse {
    match engine.stations().remove(station_id).await {
        Ok(station) => (StatusCode::OK, Json(StationResponse { station })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}
