//! Ampstop API Library
//!
//! HTTP surface for station availability, charging sessions, charger
//! reservations and billing previews.

mod billing;
mod reservation;
mod session;
mod station;

use ampstop_core::{ChargingError, StorageError};
use ampstop_engine::Engine;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use crate::billing::BillingPreviewResponse;
pub use crate::reservation::{ReservationResponse, ReservationsResponse};
pub use crate::session::{PaymentRequest, SessionResponse, SessionsResponse};
pub use crate::station::{StationResponse, StationStatusRequest, StationsResponse};

pub type SharedEngine = Arc<Engine>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    /// Present on invalid transitions so the caller can refresh and retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,
}

pub(crate) fn charging_error_to_response(error: ChargingError) -> Response {
    let status = match &error {
        ChargingError::Validation(_) => StatusCode::BAD_REQUEST,
        ChargingError::NotFound { .. }
        | ChargingError::Storage(StorageError::MissingReference { .. }) => StatusCode::NOT_FOUND,
        ChargingError::InvalidTransition { .. } | ChargingError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        ChargingError::Storage(
            StorageError::Duplicate { .. }
            | StorageError::Referenced { .. }
            | StorageError::Overlap { .. },
        ) => StatusCode::CONFLICT,
        ChargingError::Storage(StorageError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(%error, "Request failed");
    }

    (
        status,
        Json(ErrorResponse {
            current_status: error.actual_state().map(String::from),
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Create the application router with all endpoints
pub fn create_app(engine: Engine) -> Router {
    let shared_state: SharedEngine = Arc::new(engine);
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/stations",
            get(station::list_stations).put(station::upsert_station),
        )
        .route("/stations/{station_id}", delete(station::remove_station))
        .route(
            "/stations/{station_id}/status",
            put(station::set_station_status),
        )
        .route(
            "/sessions",
            get(session::list_sessions).post(session::book_session),
        )
        .route(
            "/sessions/{session_id}",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/sessions/{session_id}/start", post(session::start_session))
        .route(
            "/sessions/{session_id}/complete",
            post(session::complete_session),
        )
        .route("/sessions/{session_id}/cancel", post(session::cancel_session))
        .route(
            "/sessions/{session_id}/payment",
            post(session::record_payment),
        )
        .route("/billing/preview", post(billing::preview_billing))
        .route(
            "/reservations",
            get(reservation::list_reservations).post(reservation::create_reservation),
        )
        .route(
            "/reservations/{reservation_id}",
            get(reservation::get_reservation).delete(reservation::delete_reservation),
        )
        .route(
            "/reservations/{reservation_id}/confirm",
            post(reservation::confirm_reservation),
        )
        .route(
            "/reservations/{reservation_id}/cancel",
            post(reservation::cancel_reservation),
        )
        .route(
            "/reservations/{reservation_id}/complete",
            post(reservation::complete_reservation),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}
