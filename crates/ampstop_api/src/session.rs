use ampstop_core::{ChargingSession, PaymentStatus, SessionFilter, SessionStatus};
use ampstop_engine::{BookingRequest, CompleteRequest, StartRequest};
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
pub struct SessionResponse {
    pub session: ChargingSession,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub sessions: Vec<ChargingSession>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub status: Option<SessionStatus>,
    pub station_id: Option<Uuid>,
}

fn session_response(
    status: StatusCode,
    result: Result<ChargingSession, ampstop_core::ChargingError>,
) -> axum::response::Response {
    match result {
        Ok(session) => (status, Json(SessionResponse { session })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

/// List charging sessions, newest first
pub async fn list_sessions(
    State(engine): State<SharedEngine>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let filter = SessionFilter {
        status: query.status,
        station_id: query.station_id,
    };
    match engine.sessions().list(filter).await {
        Ok(sessions) => (StatusCode::OK, Json(SessionsResponse { sessions })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}

pub async fn get_session(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    session_response(StatusCode::OK, engine.sessions().get(session_id).await)
}

/// Book a charging session
pub async fn book_session(
    State(engine): State<SharedEngine>,
    Json(payload): Json<BookingRequest>,
) -> impl IntoResponse {
    session_response(StatusCode::CREATED, engine.sessions().book(payload).await)
}

/// Staff start charging on a booked session
pub async fn start_session(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
    payload: Option<Json<StartRequest>>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    session_response(
        StatusCode::OK,
        engine.sessions().start(session_id, payload).await,
    )
}

/// Close an active session, optionally billing it
pub async fn complete_session(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
    payload: Option<Json<CompleteRequest>>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    session_response(
        StatusCode::OK,
        engine.sessions().complete(session_id, payload).await,
    )
}

pub async fn cancel_session(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    session_response(StatusCode::OK, engine.sessions().cancel(session_id).await)
}

pub async fn record_payment(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> impl IntoResponse {
    session_response(
        StatusCode::OK,
        engine
            .sessions()
            .record_payment(session_id, payload.payment_status)
            .await,
    )
}

/// Remove a completed or cancelled session
pub async fn delete_session(
    State(engine): State<SharedEngine>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    session_response(StatusCode::OK, engine.sessions().delete(session_id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorResponse;
    use crate::test_support::*;
    use serde_json::json;

    async fn book(app: &axum::Router, station: &str) -> Uuid {
        let (status, body) = send(app, "POST", "/sessions", Some(booking_body(station))).await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value::<SessionResponse>(body)
            .unwrap()
            .session
            .id
    }

    #[tokio::test]
    async fn test_book_session_missing_fields() {
        let (app, _, _) = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/sessions",
            Some(json!({ "customerName": "Dana Reyes" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(error.error.contains("stationId"));
        assert!(error.current_status.is_none());
    }

    #[tokio::test]
    async fn test_book_session_maintenance_station() {
        let (app, _, _) = test_app();
        let (status, body) = send(&app, "POST", "/sessions", Some(booking_body("CS-03"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_book_session_unknown_station() {
        let (app, _, _) = test_app();
        let (status, body) = send(&app, "POST", "/sessions", Some(booking_body("CS-77"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_complete_booked_session_conflict() {
        let (app, _, _) = test_app();
        let session_id = book(&app, "CS-01").await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/complete"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.current_status.as_deref(), Some("booked"));
        assert!(error.error.contains("Cannot complete session"));
    }

    #[tokio::test]
    async fn test_start_twice_conflict() {
        let (app, _, _) = test_app();
        let session_id = book(&app, "CS-01").await;
        let uri = format!("/sessions/{session_id}/start");

        let (status, body) = send(&app, "POST", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "active");
        assert_eq!(body["session"]["expectedEndTime"], "2026-03-01T12:00:00Z");

        let (status, body) = send(&app, "POST", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["currentStatus"], "active");
    }

    #[tokio::test]
    async fn test_start_and_complete_without_body() {
        let (app, _, _) = test_app();
        let session_id = book(&app, "CS-01").await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/start"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "active");
        assert_eq!(body["session"]["expectedEndTime"], "2026-03-01T12:00:00Z");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/complete"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "completed");
        assert_eq!(body["session"]["paymentStatus"], "pending");
    }

    #[tokio::test]
    async fn test_delete_booked_session_refused() {
        let (app, _, _) = test_app();
        let session_id = book(&app, "CS-01").await;

        let (status, body) = send(&app, "DELETE", &format!("/sessions/{session_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["currentStatus"], "booked");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/cancel"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "cancelled");

        let (status, _) = send(&app, "DELETE", &format!("/sessions/{session_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_record_payment() {
        let (app, _, _) = test_app();
        let session_id = book(&app, "CS-01").await;
        send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/start"),
            Some(json!({})),
        )
        .await;
        send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/complete"),
            Some(json!({ "paid": false })),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{session_id}/payment"),
            Some(json!({ "paymentStatus": "failed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["paymentStatus"], "failed");
    }

    #[tokio::test]
    async fn test_list_sessions_filters() {
        let (app, _, stations) = test_app();
        let first = book(&app, "CS-01").await;
        book(&app, "CS-02").await;
        send(&app, "POST", &format!("/sessions/{first}/cancel"), None).await;

        let (status, body) = send(&app, "GET", "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        let all: SessionsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(all.sessions.len(), 2);

        let (_, body) = send(&app, "GET", "/sessions?status=cancelled", None).await;
        let cancelled: SessionsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cancelled.sessions.len(), 1);
        assert_eq!(cancelled.sessions[0].id, first);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/sessions?stationId={}", stations[1].id),
            None,
        )
        .await;
        let on_cs2: SessionsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(on_cs2.sessions.len(), 1);
        assert_eq!(on_cs2.sessions[0].station_id, stations[1].id);
    }
}
