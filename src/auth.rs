//! Bearer token verification. Tokens are issued elsewhere; this side only checks
//! signature, expiry and (optionally) issuer, then exposes the permission list.

use crate::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    pub user_id: i64,
    /// Permission names, e.g. "Read banners".
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Clone)]
pub struct TokenVerifier {
    /// None for an empty secret: every token is rejected.
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        let key = (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes()));
        if key.is_none() {
            tracing::warn!("token verifier built without a secret; all tokens will be rejected");
        }
        TokenVerifier { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("token verification is not configured".into()))?;
        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AppError::Unauthorized("invalid or expired token".into())
            })
    }
}

/// Verified caller: the claims plus a lookup set for permission checks.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    permissions: HashSet<String>,
}

impl AuthUser {
    pub fn new(claims: Claims) -> Self {
        let permissions = claims.permissions.iter().cloned().collect();
        AuthUser { claims, permissions }
    }

    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }

    pub fn has(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// 403 naming the permission when the caller lacks it.
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.claims.user_id, permission, "permission denied");
            Err(AppError::Forbidden(permission.to_string()))
        }
    }
}

/// `Authorization: Bearer <token>` value, if well-formed.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
