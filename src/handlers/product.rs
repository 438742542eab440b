//! Product handlers. Reads go through the join assembler; writes replace a product's
//! specification links and images together.

use super::{body_to_map, parse_id};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response;
use crate::service::{CatalogService, ProductInput};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

const NOUN: &str = "products";

fn require(user: &AuthUser, action: &str) -> Result<(), AppError> {
    user.require(&format!("{} {}", action, NOUN))
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("product {}", id))
}

pub async fn list(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    require(&user, "Read")?;
    let products = CatalogService::list(&state.pool, state.media_base()).await?;
    Ok(response::many(products))
}

pub async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require(&user, "Read")?;
    let id = parse_id(&id_str)?;
    let product = CatalogService::read(&state.pool, id, state.media_base())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(response::ok(product))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    require(&user, "Create")?;
    let input = ProductInput::from_json(body)?;
    let product = CatalogService::create(&state.pool, &input, state.media_base()).await?;
    Ok(response::created(product))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id_str): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    require(&user, "Update")?;
    let id = parse_id(&id_str)?;
    let input = ProductInput::from_json(body)?;
    let product = CatalogService::update(&state.pool, id, &input, state.media_base())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(response::ok(product))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require(&user, "Delete")?;
    let id = parse_id(&id_str)?;
    let out = CatalogService::delete(&state.pool, id).await?.ok_or_else(|| not_found(id))?;
    Ok(response::ok(out))
}

/// `PUT /products/:id/category` sets `product_category`; `PUT /products/:id/new` sets `new`.
pub async fn set_flag(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id_str, flag)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    require(&user, "Update")?;
    let id = parse_id(&id_str)?;
    let column = match flag.as_str() {
        "category" => "product_category",
        other => other,
    };
    let product = CatalogService::set_flag(&state.pool, id, column, &body_to_map(body)?, state.media_base())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(response::ok(product))
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicQuery {
    #[serde(default)]
    pub new: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// `GET /public/products`, `?new=1` for new arrivals, `?category_id=` for one category.
pub async fn public_list(
    State(state): State<AppState>,
    Query(q): Query<PublicQuery>,
) -> Result<impl IntoResponse, AppError> {
    let products = CatalogService::list_public(&state.pool, q.new == Some(1), q.category_id, state.media_base()).await?;
    Ok(response::many(products))
}

pub async fn public_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = CatalogService::by_slug(&state.pool, &slug, state.media_base())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", slug)))?;
    Ok(response::ok(product))
}
