//! Extract the authenticated caller from the `Authorization` header.

use crate::auth::{bearer_token, AuthUser};
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        let token = bearer_token(header).ok_or_else(|| AppError::Unauthorized("malformed authorization header".into()))?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthUser::new(claims))
    }
}
