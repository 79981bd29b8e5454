use ampstop_core::ChargerReservation;
use ampstop_engine::ReservationRequest;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SharedEngine, charging_error_to_response};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub reservation: ChargerReservation,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationsResponse {
    pub reservations: Vec<ChargerReservation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationQuery {
    pub date: Option<NaiveDate>,
}

fn reservation_response(
    status: StatusCode,
    result: ampstop_core::ChargingResult<ChargerReservation>,
) -> Response {
    match result {
        Ok(reservation) => (status, Json(ReservationResponse { reservation })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

/// List reservations, optionally for one day
pub async fn list_reservations(
    State(engine): State<SharedEngine>,
    Query(query): Query<ReservationQuery>,
) -> impl IntoResponse {
    match engine.reservations().list(query.date).await {
        Ok(reservations) => {
            (StatusCode::OK, Json(ReservationsResponse { reservations })).into_response()
        }
        Err(error) => charging_error_to_response(error),
    }
}

pub async fn get_reservation(
    State(engine): State<SharedEngine>,
    Path(reservation_id): Path<Uuid>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::OK,
        engine.reservations().get(reservation_id).await,
    )
}

/// Request a time slot on a charger
pub async fn create_reservation(
    State(engine): State<SharedEngine>,
    Json(payload): Json<ReservationRequest>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::CREATED,
        engine.reservations().create(payload).await,
    )
}

pub async fn confirm_reservation(
    State(engine): State<SharedEngine>,
    Path(reservation_id): Path<Uuid>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::OK,
        engine.reservations().confirm(reservation_id).await,
    )
}

pub async fn cancel_reservation(
    State(engine): State<SharedEngine>,
    Path(reservation_id): Path<Uuid>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::OK,
        engine.reservations().cancel(reservation_id).await,
    )
}

pub async fn complete_reservation(
    State(engine): State<SharedEngine>,
    Path(reservation_id): Path<Uuid>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::OK,
        engine.reservations().complete(reservation_id).await,
    )
}

pub async fn delete_reservation(
    State(engine): State<SharedEngine>,
    Path(reservation_id): Path<Uuid>,
) -> impl IntoResponse {
    reservation_response(
        StatusCode::OK,
        engine.reservations().delete(reservation_id).await,
    )
}
