use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::users::AuthUser;
use crate::engine::transition::{self, DeliveryUpdate};
use crate::error::AppError;
use crate::geo;
use crate::models::delivery::{
    Delivery, DeliveryStatus, PackageCategory, PaymentStatus, Place,
};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/mine", get(list_mine))
        .route("/deliveries/pool", get(list_pool))
        .route(
            "/deliveries/:id",
            get(get_delivery).put(update_delivery).delete(delete_delivery),
        )
        .route("/deliveries/:id/confirm", post(confirm_delivery))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub package_details: String,
    pub pickup_location: Place,
    pub delivery_location: Place,
    pub package_weight: f64,
    pub package_type: PackageCategory,
    pub package_image: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDeliveryRequest {
    pub delivery_status: Option<DeliveryStatus>,
    pub delivery_rating: Option<u8>,
    pub delivery_feedback: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub otp: String,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<Delivery>), AppError> {
    if user.role != Role::Customer {
        return Err(AppError::Forbidden(
            "only customers can create deliveries".to_string(),
        ));
    }

    if payload.package_details.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "package details are required".to_string(),
        ));
    }

    if payload.package_weight <= 0.0 {
        return Err(AppError::InvalidInput(
            "package weight must be > 0".to_string(),
        ));
    }

    if !payload.pickup_location.has_valid_coordinates()
        || !payload.delivery_location.has_valid_coordinates()
    {
        return Err(AppError::InvalidInput(
            "location coordinates are out of range".to_string(),
        ));
    }

    if payload.pickup_location == payload.delivery_location {
        return Err(AppError::InvalidInput(
            "pickup and delivery locations must differ".to_string(),
        ));
    }

    let distance_km = geo::haversine_km(&payload.pickup_location, &payload.delivery_location);
    let cost = geo::delivery_cost(payload.package_weight, distance_km);
    let now = Utc::now();

    let delivery = Delivery {
        id: Uuid::new_v4(),
        customer_id: user.id,
        customer_name: user.name,
        driver_id: None,
        driver_name: None,
        package_details: payload.package_details,
        package_weight_kg: payload.package_weight,
        package_category: payload.package_type,
        pickup: payload.pickup_location,
        dropoff: payload.delivery_location,
        distance_km,
        cost,
        delivery_status: DeliveryStatus::Pending,
        payment_status: PaymentStatus::Pending,
        rating: None,
        feedback: String::new(),
        package_image: payload.package_image,
        created_at: now,
        updated_at: now,
    };

    state.deliveries.insert(delivery.clone());
    state.metrics.deliveries_created_total.inc();
    tracing::info!(
        delivery_id = %delivery.id,
        customer_id = %delivery.customer_id,
        distance_km = delivery.distance_km,
        cost = delivery.cost,
        "delivery created"
    );

    Ok((StatusCode::CREATED, Json(delivery)))
}

async fn list_mine(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Delivery>>, AppError> {
    if user.role != Role::Customer {
        return Err(AppError::Forbidden(
            "only customers have a deliveries list".to_string(),
        ));
    }

    Ok(Json(state.deliveries.list_for_customer(user.id)))
}

async fn list_pool(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Delivery>>, AppError> {
    if user.role != Role::Driver {
        return Err(AppError::Forbidden(
            "only drivers can view the pool".to_string(),
        ));
    }

    Ok(Json(state.deliveries.list_for_driver(user.id)))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .deliveries
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    Ok(Json(delivery))
}

async fn update_delivery(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    let update = DeliveryUpdate::from_parts(
        user.role,
        payload.delivery_status,
        payload.delivery_rating,
        payload.delivery_feedback,
        payload.payment_status,
    )?;

    let result = state.deliveries.update(id, |delivery| {
        // Capture funds before flipping the flag; a gateway failure leaves
        // the payment status untouched.
        if matches!(update, DeliveryUpdate::CustomerPay) {
            transition::authorize_payment(delivery, &user)?;
            state.payments.capture(delivery.id, delivery.cost)?;
        }
        transition::apply_update(delivery, &user, &update, Utc::now())
    });

    match &result {
        Ok(delivery) => {
            state
                .metrics
                .transitions_total
                .with_label_values(&["success"])
                .inc();
            tracing::info!(
                delivery_id = %id,
                actor_id = %user.id,
                status = ?delivery.delivery_status,
                "delivery updated"
            );
        }
        Err(err) => {
            state
                .metrics
                .transitions_total
                .with_label_values(&["error"])
                .inc();
            tracing::warn!(delivery_id = %id, actor_id = %user.id, error = %err, "update rejected");
        }
    }

    result.map(Json)
}

async fn delete_delivery(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .deliveries
        .remove_if(id, |delivery| transition::authorize_delete(delivery, &user))?;

    tracing::info!(delivery_id = %id, customer_id = %user.id, "delivery deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Combined handoff confirmation: verifies the code, then performs the
/// delivered transition under the same per-id lock. A failed verification
/// never touches the delivery.
async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    if state.deliveries.get(id).is_none() {
        return Err(AppError::NotFound(format!("delivery {id} not found")));
    }

    if !state.otp.verify(id, &payload.otp) {
        state
            .metrics
            .otp_verifications_total
            .with_label_values(&["error"])
            .inc();
        return Err(AppError::InvalidOtp);
    }
    state
        .metrics
        .otp_verifications_total
        .with_label_values(&["success"])
        .inc();

    let delivery = state.deliveries.update(id, |delivery| {
        transition::apply_update(
            delivery,
            &user,
            &DeliveryUpdate::DriverMarkDelivered,
            Utc::now(),
        )
    })?;

    tracing::info!(delivery_id = %id, driver_id = %user.id, "handoff confirmed");
    Ok(Json(delivery))
}
