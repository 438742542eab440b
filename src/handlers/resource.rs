//! Generic resource handlers. The resource is resolved from the `/:path_segment` route
//! parameter through the registry; admin routes check `"<Action> <noun>"` permissions.

use super::{body_to_map, page, parse_id};
use crate::auth::AuthUser;
use crate::config::{Action, ResourceDef};
use crate::error::AppError;
use crate::response;
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn resolve(state: &AppState, segment: &str) -> Result<&'static ResourceDef, AppError> {
    state
        .registry
        .get(segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown resource: {}", segment)))
}

/// Resolve and check the permission for `action` in one step.
fn authorize(state: &AppState, user: &AuthUser, segment: &str, action: Action) -> Result<&'static ResourceDef, AppError> {
    let def = resolve(state, segment)?;
    user.require(&def.permission(action))?;
    Ok(def)
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Read)?;
    let filters = RequestValidator::filters(def, &params, None)?;
    let (limit, offset) = page(&params);
    let rows = CrudService::list(&state.pool, def, &filters, limit, offset, state.media_base()).await?;
    Ok(response::many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Create)?;
    let body = RequestValidator::validate_create(def, &body_to_map(body)?)?;
    let row = CrudService::create(&state.pool, def, &body, state.media_base()).await?;
    Ok(response::created(row))
}

pub async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Path((segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Read)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state.pool, def, id, false, state.media_base())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", def.name, id)))?;
    Ok(response::ok(row))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path((segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Update)?;
    let id = parse_id(&id_str)?;
    let body = RequestValidator::validate_update(def, &body_to_map(body)?)?;
    let row = CrudService::update(&state.pool, def, id, &body, state.media_base())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", def.name, id)))?;
    Ok(response::ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path((segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Delete)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::delete(&state.pool, def, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", def.name, id)))?;
    Ok(response::ok(row))
}

/// `PUT /:path_segment/:id/:field` with `{ "<field>": value }`.
pub async fn set_flag(
    State(state): State<AppState>,
    user: AuthUser,
    Path((segment, id_str, field)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let def = authorize(&state, &user, &segment, Action::Update)?;
    let id = parse_id(&id_str)?;
    let body = RequestValidator::validate_flag(def, &field, &body_to_map(body)?)?;
    let row = CrudService::update(&state.pool, def, id, &body, state.media_base())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", def.name, id)))?;
    Ok(response::ok(row))
}

fn public_def(state: &AppState, segment: &str) -> Result<&'static ResourceDef, AppError> {
    let def = resolve(state, segment)?;
    if def.public.is_none() {
        return Err(AppError::NotFound(format!("unknown resource: {}", segment)));
    }
    Ok(def)
}

pub async fn public_list(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let def = public_def(&state, &segment)?;
    let allowed = def.public.as_ref().map(|p| p.filters).unwrap_or_default();
    let filters = RequestValidator::filters(def, &params, Some(allowed))?;
    let (limit, _) = page(&params);
    let rows = CrudService::list_public(&state.pool, def, &filters, limit, state.media_base()).await?;
    Ok(response::many(rows))
}

pub async fn public_read(
    State(state): State<AppState>,
    Path((segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let def = public_def(&state, &segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state.pool, def, id, true, state.media_base())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", def.name, id)))?;
    Ok(response::ok(row))
}
