//! Product join queries: one row per (product, specification, image) combination,
//! re-nested by [`crate::assemble`].

use super::builder::QueryBuf;
use crate::config::ColumnKind;
use serde_json::Value;

const SELECT_PRODUCT_ROWS: &str = r#"SELECT
    p."id" AS product_id,
    p."name" AS product_name,
    p."slug",
    p."detail",
    p."status",
    p."new",
    p."product_category",
    p."category",
    p."category_sub",
    p."created_at",
    p."updated_at",
    p."category_id",
    p."image_id",
    p."path" AS primary_path,
    p."user_id",
    ps."specification_id",
    s."title" AS spec_title,
    s."descriptions" AS spec_description,
    pi."id" AS product_image_id,
    pi."image_path"
FROM "product" p
LEFT JOIN "product_specification" ps ON ps."product_id" = p."id"
LEFT JOIN "specification" s ON s."id" = ps."specification_id"
LEFT JOIN "product_images" pi ON pi."product_id" = p."id""#;

/// Which products a join query selects.
#[derive(Clone, Debug, PartialEq)]
pub enum ProductFilter {
    /// Every product regardless of status, oldest first (admin listing).
    All,
    /// One product by id, any status.
    Id(i64),
    /// One active product by slug.
    Slug(String),
    /// Active products, newest first, optionally only "new" ones and/or one category.
    Active { new_only: bool, category_id: Option<i64> },
}

pub fn select_products(filter: &ProductFilter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts: Vec<String> = Vec::new();
    let mut descending = false;
    match filter {
        ProductFilter::All => {}
        ProductFilter::Id(id) => {
            let ph = q.placeholder(Value::from(*id), ColumnKind::BigInt);
            where_parts.push(format!(r#"p."id" = {}"#, ph));
        }
        ProductFilter::Slug(slug) => {
            let ph = q.placeholder(Value::String(slug.clone()), ColumnKind::Text);
            where_parts.push(format!(r#"p."slug" = {}"#, ph));
            where_parts.push(r#"p."status" = 1"#.into());
        }
        ProductFilter::Active { new_only, category_id } => {
            where_parts.push(r#"p."status" = 1"#.into());
            if *new_only {
                where_parts.push(r#"p."new" = 1"#.into());
            }
            if let Some(cid) = category_id {
                let ph = q.placeholder(Value::from(*cid), ColumnKind::BigInt);
                where_parts.push(format!(r#"p."category_id" = {}"#, ph));
            }
            descending = true;
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!("\nWHERE {}", where_parts.join(" AND "))
    };
    let dir = if descending { "DESC" } else { "ASC" };
    q.sql = format!(
        "{}{}\nORDER BY p.\"id\" {}, ps.\"id\", pi.\"id\"",
        SELECT_PRODUCT_ROWS, where_clause, dir
    );
    q
}

pub const INSERT_PRODUCT: &str = r#"INSERT INTO "product"
    ("category", "category_sub", "name", "slug", "image_id", "path", "detail", "user_id", "category_id", "status", "created_at", "updated_at")
VALUES ($1::text, $2::text, $3::text, $4::text, $5::int8, $6::text, $7::text, $8::int8, $9::int8, $10::int2, NOW(), NOW())
RETURNING "id""#;

pub const UPDATE_PRODUCT: &str = r#"UPDATE "product" SET
    "category" = $1::text,
    "category_sub" = $2::text,
    "name" = $3::text,
    "slug" = $4::text,
    "image_id" = $5::int8,
    "path" = $6::text,
    "detail" = $7::text,
    "user_id" = $8::int8,
    "category_id" = $9::int8,
    "status" = $10::int2,
    "updated_at" = NOW()
WHERE "id" = $11::int8
RETURNING "id""#;

pub const DELETE_PRODUCT_SPECIFICATIONS: &str = r#"DELETE FROM "product_specification" WHERE "product_id" = $1::int8"#;
pub const INSERT_PRODUCT_SPECIFICATION: &str =
    r#"INSERT INTO "product_specification" ("product_id", "specification_id") VALUES ($1::int8, $2::int8)"#;
pub const DELETE_PRODUCT_IMAGES: &str = r#"DELETE FROM "product_images" WHERE "product_id" = $1::int8"#;
pub const INSERT_PRODUCT_IMAGE: &str = r#"INSERT INTO "product_images" ("product_id", "image_path", "created_at", "updated_at")
VALUES ($1::int8, $2::text, NOW(), NOW())"#;
pub const SOFT_DELETE_PRODUCT: &str =
    r#"UPDATE "product" SET "status" = 0, "updated_at" = NOW() WHERE "id" = $1::int8 RETURNING "id""#;

/// Product columns that can be set on their own.
pub const PRODUCT_FLAGS: &[(&str, ColumnKind)] = &[
    ("product_category", ColumnKind::Text),
    ("new", ColumnKind::SmallInt),
];

/// `UPDATE product SET <flag> = $1, updated_at = NOW() WHERE id = $2`. None for an unknown flag.
pub fn set_product_flag(flag: &str, value: &Value, id: i64) -> Option<QueryBuf> {
    let (name, kind) = PRODUCT_FLAGS.iter().find(|(n, _)| *n == flag)?;
    let mut q = QueryBuf::new();
    let ph = q.placeholder(value.clone(), *kind);
    let id_ph = q.placeholder(Value::from(id), ColumnKind::BigInt);
    q.sql = format!(
        r#"UPDATE "product" SET "{}" = {}, "updated_at" = NOW() WHERE "id" = {} RETURNING "id""#,
        name, ph, id_ph
    );
    Some(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_filter_orders_newest_first() {
        let q = select_products(&ProductFilter::Active { new_only: true, category_id: Some(3) });
        assert!(q.sql.contains(r#"WHERE p."status" = 1 AND p."new" = 1 AND p."category_id" = $1::int8"#));
        assert!(q.sql.ends_with(r#"ORDER BY p."id" DESC, ps."id", pi."id""#));
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn admin_listing_has_no_where() {
        let q = select_products(&ProductFilter::All);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn slug_lookup_is_active_only() {
        let q = select_products(&ProductFilter::Slug("split-ac".into()));
        assert!(q.sql.contains(r#"p."slug" = $1::text AND p."status" = 1"#));
    }

    #[test]
    fn flag_update_rejects_unknown_column() {
        assert!(set_product_flag("name", &json!("x"), 1).is_none());
        let q = set_product_flag("new", &json!(1), 4).unwrap();
        assert!(q.sql.starts_with(r#"UPDATE "product" SET "new" = $1::int2"#));
        assert_eq!(q.params, vec![json!(1), json!(4)]);
    }
}
