use ampstop_core::{BillingBreakdown, BillingInput};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{SharedEngine, charging_error_to_response};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPreviewResponse {
    pub billing: BillingBreakdown,
}

/// Price a set of meter readings without touching any session
pub async fn preview_billing(
    State(engine): State<SharedEngine>,
    Json(input): Json<BillingInput>,
) -> impl IntoResponse {
    match engine.preview_billing(&input) {
        Ok(billing) => (StatusCode::OK, Json(BillingPreviewResponse { billing })).into_response(),
        Err(error) => charging_error_to_response(error),
    }
}
