//! Public contact form.

use super::body_to_map;
use crate::error::AppError;
use crate::response;
use crate::service::ContactService;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value;

pub async fn submit(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let row = ContactService::submit(&state.pool, state.notifiers.clone(), &body_to_map(body)?).await?;
    Ok(response::created(row))
}
