//! Generic CRUD execution against PostgreSQL, driven by a [`ResourceDef`].

use crate::assemble::JoinRow;
use crate::config::ResourceDef;
use crate::error::AppError;
use crate::media::rewrite_media;
use crate::sql::{delete, exists, insert, select_by_id, select_list, update, PgBindValue, QueryBuf, MAX_LIMIT};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres};
use std::collections::HashMap;

const DEFAULT_LIMIT: u32 = 100;

pub struct CrudService;

impl CrudService {
    /// Admin list: any status, exact-match filters, limit (default 100) and offset.
    pub async fn list(
        pool: &PgPool,
        def: &ResourceDef,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
        media_base: &str,
    ) -> Result<Vec<Value>, AppError> {
        let q = select_list(def, filters, &def.admin_order, Some(limit.unwrap_or(DEFAULT_LIMIT)), offset, false);
        let rows = fetch_all(pool, &q).await?;
        Ok(rows.into_iter().map(|r| present(r, def, media_base)).collect())
    }

    /// Public list: active rows only, in the view's order. Filters must already be whitelisted.
    pub async fn list_public(
        pool: &PgPool,
        def: &ResourceDef,
        filters: &[(String, Value)],
        limit: Option<u32>,
        media_base: &str,
    ) -> Result<Vec<Value>, AppError> {
        let view = def
            .public
            .as_ref()
            .ok_or_else(|| AppError::NotFound(def.path_segment.to_string()))?;
        let limit = limit.or(view.default_limit).unwrap_or(MAX_LIMIT);
        let q = select_list(def, filters, &view.order, Some(limit), None, true);
        let rows = fetch_all(pool, &q).await?;
        Ok(rows.into_iter().map(|r| present(r, def, media_base)).collect())
    }

    /// Fetch one row by id. `active_only` hides soft-deleted rows.
    pub async fn read(
        pool: &PgPool,
        def: &ResourceDef,
        id: i64,
        active_only: bool,
        media_base: &str,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_id(def, id, active_only);
        let row = fetch_optional(pool, &q).await?;
        Ok(row.map(|r| present(r, def, media_base)))
    }

    /// Insert one row after reference checks; returns the stored row as read back.
    pub async fn create(
        pool: &PgPool,
        def: &ResourceDef,
        body: &HashMap<String, Value>,
        media_base: &str,
    ) -> Result<Value, AppError> {
        let mut tx = pool.begin().await?;
        check_references(&mut tx, def, body).await?;
        let id = returned_id(fetch_optional(&mut *tx, &insert(def, body)).await?)
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        let row = fetch_optional(&mut *tx, &select_by_id(def, id, false))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        tracing::info!(resource = def.name, id, "created");
        Ok(present(row, def, media_base))
    }

    /// Update the columns present in body. None when the id does not exist.
    pub async fn update(
        pool: &PgPool,
        def: &ResourceDef,
        id: i64,
        body: &HashMap<String, Value>,
        media_base: &str,
    ) -> Result<Option<Value>, AppError> {
        let mut tx = pool.begin().await?;
        check_references(&mut tx, def, body).await?;
        if returned_id(fetch_optional(&mut *tx, &update(def, id, body)).await?).is_none() {
            return Ok(None);
        }
        let row = fetch_optional(&mut *tx, &select_by_id(def, id, false)).await?;
        tx.commit().await?;
        tracing::info!(resource = def.name, id, "updated");
        Ok(row.map(|r| present(r, def, media_base)))
    }

    /// Reference checks alone, for callers with side effects to run before the insert.
    pub async fn verify_references(pool: &PgPool, def: &ResourceDef, body: &HashMap<String, Value>) -> Result<(), AppError> {
        let mut conn = pool.acquire().await?;
        check_references(&mut conn, def, body).await
    }

    /// Soft delete (`status = 0`), or hard delete without a status column. Returns `{id}`.
    pub async fn delete(pool: &PgPool, def: &ResourceDef, id: i64) -> Result<Option<Value>, AppError> {
        let row = fetch_optional(pool, &delete(def, id)).await?;
        let Some(id) = returned_id(row) else {
            return Ok(None);
        };
        tracing::info!(resource = def.name, id, soft = def.has_status, "deleted");
        Ok(Some(serde_json::json!({ "id": id })))
    }
}

/// Every non-null reference column in body must name an existing row.
async fn check_references(
    conn: &mut PgConnection,
    def: &ResourceDef,
    body: &HashMap<String, Value>,
) -> Result<(), AppError> {
    for r in def.references {
        let Some(v) = body.get(r.column).filter(|v| !v.is_null()) else {
            continue;
        };
        if fetch_optional(&mut *conn, &exists(r.table, v)).await?.is_none() {
            return Err(AppError::Validation(format!("{} {} does not exist in {}", r.column, v, r.table)));
        }
    }
    Ok(())
}

fn present(mut row: JoinRow, def: &ResourceDef, media_base: &str) -> Value {
    rewrite_media(&mut row, def.media_columns, media_base);
    Value::Object(row)
}

pub(crate) fn returned_id(row: Option<JoinRow>) -> Option<i64> {
    row.and_then(|r| r.get("id").and_then(Value::as_i64))
}

fn bind_all<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

pub(crate) async fn fetch_all<'c, E>(exec: E, q: &QueryBuf) -> Result<Vec<JoinRow>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_all(&q.sql, &q.params).fetch_all(exec).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

pub(crate) async fn fetch_optional<'c, E>(exec: E, q: &QueryBuf) -> Result<Option<JoinRow>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_all(&q.sql, &q.params).fetch_optional(exec).await?;
    Ok(row.as_ref().map(row_to_json))
}

pub(crate) async fn execute<'c, E>(exec: E, q: &QueryBuf) -> Result<u64, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let done = bind_all(&q.sql, &q.params).execute(exec).await?;
    Ok(done.rows_affected())
}

pub(crate) fn row_to_json(row: &PgRow) -> JoinRow {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BANNER;
    use serde_json::json;

    #[test]
    fn present_rewrites_banner_media() {
        let row = json!({"id": 1, "path": "a.jpg", "gallery_path": "/g.jpg", "title": "t"})
            .as_object()
            .unwrap()
            .clone();
        let v = present(row, &BANNER, "https://cdn.example");
        assert_eq!(v["path"], json!("https://cdn.example/a.jpg"));
        assert_eq!(v["gallery_path"], json!("https://cdn.example/g.jpg"));
        assert_eq!(v["title"], json!("t"));
    }

    #[test]
    fn returned_id_reads_integer_id() {
        let row = json!({"id": 12}).as_object().unwrap().clone();
        assert_eq!(returned_id(Some(row)), Some(12));
        assert_eq!(returned_id(None), None);
    }
}
