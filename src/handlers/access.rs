//! User-permission assignment.

use super::parse_id;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response;
use crate::service::{AccessService, AssignInput, ASSIGN_PERMISSION};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// `PUT /role-permissions/assign/:user_id` with `{ "permission_ids": [..] }`.
pub async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    user.require(ASSIGN_PERMISSION)?;
    let user_id = parse_id(&user_id)?;
    let input: AssignInput =
        serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("invalid body: {}", e)))?;
    let out = AccessService::assign(&state.pool, user_id, &input.permission_ids).await?;
    Ok(response::ok(out))
}

/// Any signed-in user may see a user's permission sheet.
pub async fn for_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_id(&user_id)?;
    let rows = AccessService::for_user(&state.pool, user_id).await?;
    Ok(response::many(rows))
}
