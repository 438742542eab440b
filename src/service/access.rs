//! Which permissions a user holds.

use super::crud::{execute, fetch_all, fetch_optional};
use crate::error::AppError;
use crate::sql::access::{DELETE_USER_PERMISSIONS, INSERT_USER_PERMISSION, MISSING_PERMISSIONS, SELECT_USER_PERMISSIONS};
use crate::sql::{exists, QueryBuf};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

/// Permission required to change assignments.
pub const ASSIGN_PERMISSION: &str = "Update Role Permissions";

#[derive(Debug, Default, Deserialize)]
pub struct AssignInput {
    #[serde(default, alias = "permission_id")]
    pub permission_ids: Vec<i64>,
}

pub struct AccessService;

impl AccessService {
    /// Replace the user's permissions with `permission_ids` in one transaction.
    pub async fn assign(pool: &PgPool, user_id: i64, permission_ids: &[i64]) -> Result<Value, AppError> {
        let mut ids: Vec<i64> = Vec::with_capacity(permission_ids.len());
        for id in permission_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(AppError::BadRequest("permission_ids is required".into()));
        }

        let mut tx = pool.begin().await?;
        if fetch_optional(&mut *tx, &exists("users", &Value::from(user_id))).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        let missing: Vec<i64> = sqlx::query_scalar(MISSING_PERMISSIONS)
            .bind(&ids[..])
            .fetch_all(&mut *tx)
            .await?;
        if !missing.is_empty() {
            return Err(AppError::Validation(format!("unknown or inactive permissions: {:?}", missing)));
        }

        let user = vec![Value::from(user_id)];
        execute(&mut *tx, &QueryBuf { sql: DELETE_USER_PERMISSIONS.into(), params: user }).await?;
        for pid in &ids {
            let q = QueryBuf {
                sql: INSERT_USER_PERMISSION.into(),
                params: vec![Value::from(user_id), Value::from(*pid)],
            };
            execute(&mut *tx, &q).await?;
        }
        tx.commit().await?;
        tracing::info!(user_id, count = ids.len(), "permissions assigned");
        Ok(json!({ "user_id": user_id, "assigned_permissions": ids }))
    }

    /// Every active permission with an `assigned` flag for this user.
    pub async fn for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Value>, AppError> {
        let q = QueryBuf {
            sql: SELECT_USER_PERMISSIONS.into(),
            params: vec![Value::from(user_id)],
        };
        let rows = fetch_all(pool, &q).await?;
        Ok(rows.into_iter().map(Value::Object).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn empty_assignment_is_rejected_before_touching_the_database() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let err = AccessService::assign(&pool, 1, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn accepts_legacy_body_key() {
        let input: AssignInput = serde_json::from_value(json!({"permission_id": [1, 2]})).unwrap();
        assert_eq!(input.permission_ids, vec![1, 2]);
    }
}
