//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resource definition.

use crate::config::{ColumnKind, OrderBy, ResourceDef};
use serde_json::Value;
use std::collections::HashMap;

/// Alias of the resource's own table in every SELECT.
const MAIN_ALIAS: &str = "t";

pub const MAX_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL (safe: only from the static registry).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder cast to the column type, e.g. `$3::int8`.
    pub fn placeholder(&mut self, v: Value, kind: ColumnKind) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, kind.pg_type())
    }
}

fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quoted(column))
}

fn join_alias(i: usize) -> String {
    format!("j{}", i)
}

/// `t."id", t."col"..., t."created_at", t."updated_at"` plus one aliased column per lookup join.
fn select_column_list(def: &ResourceDef) -> String {
    let mut cols = vec![qualified(MAIN_ALIAS, "id")];
    cols.extend(def.columns.iter().map(|c| qualified(MAIN_ALIAS, c.name)));
    cols.push(qualified(MAIN_ALIAS, "created_at"));
    cols.push(qualified(MAIN_ALIAS, "updated_at"));
    for (i, j) in def.joins.iter().enumerate() {
        cols.push(format!("{} AS {}", qualified(&join_alias(i), j.select), quoted(j.alias)));
    }
    cols.join(", ")
}

fn from_clause(def: &ResourceDef) -> String {
    let mut from = format!("{} {}", quoted(def.table), MAIN_ALIAS);
    for (i, j) in def.joins.iter().enumerate() {
        let alias = join_alias(i);
        from.push_str(&format!(
            " LEFT JOIN {} {} ON {} = {}",
            quoted(j.table),
            alias,
            qualified(&alias, "id"),
            qualified(MAIN_ALIAS, j.local_column)
        ));
    }
    from
}

fn order_clause(order: &OrderBy) -> String {
    let dir = if order.descending { "DESC" } else { "ASC" };
    // id as tie-breaker keeps pages stable when the sort column repeats.
    if order.column == "id" {
        format!(" ORDER BY {} {}", qualified(MAIN_ALIAS, "id"), dir)
    } else {
        format!(
            " ORDER BY {} {}, {} {}",
            qualified(MAIN_ALIAS, order.column),
            dir,
            qualified(MAIN_ALIAS, "id"),
            dir
        )
    }
}

/// SELECT list with exact-match filters on known columns, optional active-only restriction,
/// ORDER BY, LIMIT (capped at [`MAX_LIMIT`]) and OFFSET. Unknown filter columns are ignored.
pub fn select_list(
    def: &ResourceDef,
    filters: &[(String, Value)],
    order: &OrderBy,
    limit: Option<u32>,
    offset: Option<u32>,
    active_only: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    if active_only && def.has_status {
        where_parts.push(format!("{} = 1", qualified(MAIN_ALIAS, "status")));
    }
    for (col, val) in filters {
        let Some(c) = def.column(col) else { continue };
        let ph = q.placeholder(val.clone(), c.kind);
        where_parts.push(format!("{} = {}", qualified(MAIN_ALIAS, c.name), ph));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit
        .map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT)))
        .unwrap_or_default();
    let offset_clause = offset
        .filter(|n| *n > 0)
        .map(|n| format!(" OFFSET {}", n))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(def),
        from_clause(def),
        where_clause,
        order_clause(order),
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT one row by id.
pub fn select_by_id(def: &ResourceDef, id: i64, active_only: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(Value::from(id), ColumnKind::BigInt);
    let status = if active_only && def.has_status {
        format!(" AND {} = 1", qualified(MAIN_ALIAS, "status"))
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}{}",
        select_column_list(def),
        from_clause(def),
        qualified(MAIN_ALIAS, "id"),
        ph,
        status
    );
    q
}

/// INSERT known columns from body; columns with a DB default are omitted when absent.
/// Timestamps come from NOW(). Returns the new id.
pub fn insert(def: &ResourceDef, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in def.columns {
        let val = body.get(c.name).cloned();
        if val.is_none() && c.has_default {
            continue;
        }
        placeholders.push(q.placeholder(val.unwrap_or(Value::Null), c.kind));
        cols.push(quoted(c.name));
    }
    cols.push(quoted("created_at"));
    placeholders.push("NOW()".into());
    cols.push(quoted("updated_at"));
    placeholders.push("NOW()".into());
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(def.table),
        cols.join(", "),
        placeholders.join(", "),
        quoted("id")
    );
    q
}

/// UPDATE by id: SET only writable columns present in body, always bumping updated_at.
/// created_at is never touched. Returns the id, or no row when the id does not exist.
pub fn update(def: &ResourceDef, id: i64, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    // Registry order keeps placeholder numbering deterministic regardless of map order.
    for c in def.columns {
        let Some(v) = body.get(c.name) else { continue };
        let ph = q.placeholder(v.clone(), c.kind);
        sets.push(format!("{} = {}", quoted(c.name), ph));
    }
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_ph = q.placeholder(Value::from(id), ColumnKind::BigInt);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(def.table),
        sets.join(", "),
        quoted("id"),
        id_ph,
        quoted("id")
    );
    q
}

/// Soft delete: `status = 0`. Falls back to a hard DELETE for tables without a status column.
pub fn delete(def: &ResourceDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_ph = q.placeholder(Value::from(id), ColumnKind::BigInt);
    q.sql = if def.has_status {
        format!(
            "UPDATE {} SET {} = 0, {} = NOW() WHERE {} = {} RETURNING {}",
            quoted(def.table),
            quoted("status"),
            quoted("updated_at"),
            quoted("id"),
            id_ph,
            quoted("id")
        )
    } else {
        format!(
            "DELETE FROM {} WHERE {} = {} RETURNING {}",
            quoted(def.table),
            quoted("id"),
            id_ph,
            quoted("id")
        )
    };
    q
}

/// `SELECT 1 FROM table WHERE id = $1`, for reference checks.
pub fn exists(table: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id.clone(), ColumnKind::BigInt);
    q.sql = format!("SELECT 1 FROM {} WHERE {} = {}", quoted(table), quoted("id"), ph);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BANNER, CONTACT, PERMISSION};
    use serde_json::json;

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn list_joins_lookup_and_filters_active() {
        let q = select_list(
            &BANNER,
            &[("type".into(), json!(2)), ("bogus".into(), json!(1))],
            &BANNER.public.unwrap().order,
            Some(1),
            None,
            true,
        );
        assert!(q.sql.contains(r#"LEFT JOIN "gallery" j0 ON j0."id" = t."image_id""#));
        assert!(q.sql.contains(r#"j0."path" AS "gallery_path""#));
        assert!(q.sql.contains(r#"WHERE t."status" = 1 AND t."type" = $1::int2"#));
        assert!(q.sql.contains(r#"ORDER BY t."updated_at" DESC, t."id" DESC LIMIT 1"#));
        assert_eq!(q.params, vec![json!(2)]);
    }

    #[test]
    fn limit_is_capped() {
        let q = select_list(&PERMISSION, &[], &PERMISSION.admin_order, Some(50_000), Some(0), false);
        assert!(q.sql.ends_with("LIMIT 1000"));
        assert!(!q.sql.contains("status\" = 1"));
    }

    #[test]
    fn insert_skips_defaulted_status() {
        let q = insert(&PERMISSION, &body(json!({"name": "Read banners"})));
        assert_eq!(
            q.sql,
            r#"INSERT INTO "permission" ("name", "created_at", "updated_at") VALUES ($1::text, NOW(), NOW()) RETURNING "id""#
        );
        assert_eq!(q.params, vec![json!("Read banners")]);
    }

    #[test]
    fn update_numbers_params_in_column_order() {
        let q = update(&BANNER, 9, &body(json!({"type": 1, "title": "Hero", "created_at": "x"})));
        assert_eq!(
            q.sql,
            r#"UPDATE "banner" SET "title" = $1::text, "type" = $2::int2, "updated_at" = NOW() WHERE "id" = $3::int8 RETURNING "id""#
        );
        assert_eq!(q.params, vec![json!("Hero"), json!(1), json!(9)]);
    }

    #[test]
    fn delete_is_soft_only_with_status() {
        assert!(delete(&BANNER, 1).sql.starts_with(r#"UPDATE "banner" SET "status" = 0"#));
        assert!(delete(&CONTACT, 1).sql.starts_with(r#"DELETE FROM "contact_us""#));
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quoted(r#"a"b"#), r#""a""b""#);
    }
}
