use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register_user))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub role: Role,
    pub email: Option<String>,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        role: payload.role,
        email: payload.email,
    };

    state.users.insert(user.clone());
    Ok(Json(user))
}

/// The caller's resolved identity. Token verification lives with the external
/// auth service; requests carry the resolved user id in `x-user-id` and this
/// extractor turns it into a directory record or a 401.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing x-user-id header".to_string()))?;

        let user_id = header
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthenticated("malformed x-user-id header".to_string()))?;

        let user = state
            .users
            .get(user_id)
            .ok_or_else(|| AppError::Unauthenticated("unknown user".to_string()))?;

        Ok(AuthUser(user))
    }
}
