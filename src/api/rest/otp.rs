use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::rest::users::AuthUser;
use crate::engine::otp::OtpLedger;
use crate::error::AppError;
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/otp/send", post(send_otp))
        .route("/otp/verify", post(verify_otp))
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub delivery_id: Uuid,
    pub customer_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub delivery_id: Uuid,
    pub otp: String,
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Driver {
        return Err(AppError::Forbidden(
            "only drivers can request a handoff code".to_string(),
        ));
    }

    let delivery = state
        .deliveries
        .get(payload.delivery_id)
        .ok_or_else(|| AppError::NotFound("delivery not found".to_string()))?;

    if delivery.driver_id != Some(user.id) {
        return Err(AppError::Forbidden(
            "delivery is not assigned to this driver".to_string(),
        ));
    }

    if delivery.customer_id != payload.customer_id {
        return Err(AppError::InvalidInput(
            "customer does not match the delivery".to_string(),
        ));
    }

    let customer = state
        .users
        .get(payload.customer_id)
        .ok_or_else(|| AppError::NotFound("customer not found".to_string()))?;

    let email = customer
        .email
        .ok_or_else(|| AppError::NotFound("customer has no contact address".to_string()))?;

    // Notify first, persist after: a code the customer never received must
    // not become verifiable.
    let code = OtpLedger::generate_code();
    state.notifier.send_otp(&email, &code)?;
    state
        .otp
        .store(payload.delivery_id, payload.customer_id, user.id, code);

    state.metrics.otp_issued_total.inc();
    tracing::info!(
        delivery_id = %payload.delivery_id,
        driver_id = %user.id,
        "otp issued"
    );

    Ok(Json(json!({
        "success": true,
        "message": "otp generated and sent"
    })))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    if state.otp.verify(payload.delivery_id, &payload.otp) {
        state
            .metrics
            .otp_verifications_total
            .with_label_values(&["success"])
            .inc();
        Ok(Json(json!({ "success": true })))
    } else {
        state
            .metrics
            .otp_verifications_total
            .with_label_values(&["error"])
            .inc();
        Err(AppError::InvalidOtp)
    }
}
