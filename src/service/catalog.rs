//! Products: join queries re-nested by the assembler, and transactional writes of a
//! product together with its specification links and images.

use super::crud::{execute, fetch_all, fetch_optional, returned_id};
use super::validation::RequestValidator;
use crate::assemble::{assemble, AssemblySpec, ChildShape, FieldMap, RelationSpec, Resource};
use crate::config::ColumnDef;
use crate::error::AppError;
use crate::media::rewrite_media;
use crate::sql::catalog::{
    select_products, set_product_flag, ProductFilter, DELETE_PRODUCT_IMAGES, DELETE_PRODUCT_SPECIFICATIONS,
    INSERT_PRODUCT, INSERT_PRODUCT_IMAGE, INSERT_PRODUCT_SPECIFICATION, PRODUCT_FLAGS, SOFT_DELETE_PRODUCT,
    UPDATE_PRODUCT,
};
use crate::sql::{exists, QueryBuf};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::OnceLock;

const PRODUCT_FIELDS: &[FieldMap] = &[
    FieldMap::renamed("product_name", "name"),
    FieldMap::same("slug"),
    FieldMap::same("detail"),
    FieldMap::same("status"),
    FieldMap::same("new"),
    FieldMap::same("product_category"),
    FieldMap::same("category"),
    FieldMap::same("category_sub"),
    FieldMap::same("created_at"),
    FieldMap::same("updated_at"),
    FieldMap::same("category_id"),
    FieldMap::same("image_id"),
    FieldMap::same("primary_path"),
    FieldMap::same("user_id"),
];

const IMAGES: RelationSpec = RelationSpec {
    name: "images",
    child_id: "product_image_id",
    id_key: "id",
    fields: &[FieldMap::renamed("image_path", "path")],
    shape: ChildShape::Object,
};

/// Admin shape: specifications as bare ids.
pub const ADMIN_PRODUCT: AssemblySpec = AssemblySpec {
    parent_id: "product_id",
    id_key: "id",
    fields: PRODUCT_FIELDS,
    relations: &[
        RelationSpec {
            name: "specifications",
            child_id: "specification_id",
            id_key: "id",
            fields: &[],
            shape: ChildShape::Identifier,
        },
        IMAGES,
    ],
};

/// Public shape: specifications with title and description.
pub const PUBLIC_PRODUCT: AssemblySpec = AssemblySpec {
    parent_id: "product_id",
    id_key: "id",
    fields: PRODUCT_FIELDS,
    relations: &[
        RelationSpec {
            name: "specifications",
            child_id: "specification_id",
            id_key: "id",
            fields: &[
                FieldMap::renamed("spec_title", "title"),
                FieldMap::renamed("spec_description", "description"),
            ],
            shape: ChildShape::Object,
        },
        IMAGES,
    ],
};

fn slug_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").ok()).as_ref()
}

/// Lowercase, runs of anything but `[a-z0-9]` become one hyphen, no leading/trailing hyphens.
/// Non-ASCII letters are dropped rather than transliterated.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let Some(re) = slug_re() else {
        return lower;
    };
    re.replace_all(&lower, "-").trim_matches('-').to_string()
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ImageInput {
    /// Gallery id of the image, when it came from the gallery.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_sub: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: Option<i16>,
    #[serde(default, alias = "specification_id", alias = "spicification_id")]
    pub specification_ids: Vec<i64>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

impl ProductInput {
    pub fn from_json(body: Value) -> Result<Self, AppError> {
        let input: ProductInput =
            serde_json::from_value(body).map_err(|e| AppError::Validation(format!("invalid product: {}", e)))?;
        if input.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if input.slug().is_empty() {
            return Err(AppError::Validation("name must contain letters or digits".into()));
        }
        Ok(input)
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Images with a non-empty path, in request order. The first one is the primary image.
    pub fn kept_images(&self) -> Vec<&ImageInput> {
        self.images
            .iter()
            .filter(|i| i.path.as_deref().is_some_and(|p| !p.trim().is_empty()))
            .collect()
    }

    /// Spec ids without repeats, first occurrence kept.
    fn unique_specs(&self) -> Vec<i64> {
        let mut out = Vec::new();
        for id in &self.specification_ids {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }

    /// Parameters shared by INSERT_PRODUCT and UPDATE_PRODUCT ($1..$10).
    fn row_params(&self) -> Vec<Value> {
        let images = self.kept_images();
        let first = images.first();
        vec![
            self.category.clone().map(Value::String).unwrap_or(Value::Null),
            self.category_sub.clone().map(Value::String).unwrap_or(Value::Null),
            Value::String(self.name.trim().to_string()),
            Value::String(self.slug()),
            first.and_then(|i| i.id).map(Value::from).unwrap_or(Value::Null),
            first.and_then(|i| i.path.clone()).map(Value::String).unwrap_or(Value::Null),
            self.detail.clone().map(Value::String).unwrap_or(Value::Null),
            self.user_id.map(Value::from).unwrap_or(Value::Null),
            self.category_id.map(Value::from).unwrap_or(Value::Null),
            Value::from(self.status.unwrap_or(1)),
        ]
    }
}

fn fixed(sql: &str, params: Vec<Value>) -> QueryBuf {
    QueryBuf { sql: sql.to_string(), params }
}

/// Rewrite `primary_path` and each image path to absolute URLs.
fn present(resource: Resource, media_base: &str) -> Value {
    let mut v = resource.into_json();
    if let Value::Object(obj) = &mut v {
        rewrite_media(obj, &["primary_path"], media_base);
        if let Some(Value::Array(images)) = obj.get_mut("images") {
            for img in images.iter_mut() {
                if let Value::Object(img) = img {
                    rewrite_media(img, &["path"], media_base);
                }
            }
        }
    }
    v
}

pub struct CatalogService;

impl CatalogService {
    async fn load<'c, E>(
        exec: E,
        filter: &ProductFilter,
        spec: &AssemblySpec,
        media_base: &str,
    ) -> Result<Vec<Value>, AppError>
    where
        E: sqlx::Executor<'c, Database = sqlx::Postgres>,
    {
        let rows = fetch_all(exec, &select_products(filter)).await?;
        let products = assemble(&rows, spec)?;
        Ok(products.into_iter().map(|p| present(p, media_base)).collect())
    }

    /// Every product regardless of status, oldest first.
    pub async fn list(pool: &PgPool, media_base: &str) -> Result<Vec<Value>, AppError> {
        Self::load(pool, &ProductFilter::All, &ADMIN_PRODUCT, media_base).await
    }

    pub async fn read(pool: &PgPool, id: i64, media_base: &str) -> Result<Option<Value>, AppError> {
        Ok(Self::load(pool, &ProductFilter::Id(id), &ADMIN_PRODUCT, media_base)
            .await?
            .into_iter()
            .next())
    }

    /// Active products newest first; optionally only "new" ones and/or one category.
    pub async fn list_public(
        pool: &PgPool,
        new_only: bool,
        category_id: Option<i64>,
        media_base: &str,
    ) -> Result<Vec<Value>, AppError> {
        let filter = ProductFilter::Active { new_only, category_id };
        Self::load(pool, &filter, &PUBLIC_PRODUCT, media_base).await
    }

    pub async fn by_slug(pool: &PgPool, slug: &str, media_base: &str) -> Result<Option<Value>, AppError> {
        Ok(Self::load(pool, &ProductFilter::Slug(slug.to_string()), &PUBLIC_PRODUCT, media_base)
            .await?
            .into_iter()
            .next())
    }

    pub async fn create(pool: &PgPool, input: &ProductInput, media_base: &str) -> Result<Value, AppError> {
        let mut tx = pool.begin().await?;
        check_references(&mut tx, input).await?;
        let id = returned_id(fetch_optional(&mut *tx, &fixed(INSERT_PRODUCT, input.row_params())).await?)
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        insert_children(&mut tx, id, input).await?;
        let product = Self::load(&mut *tx, &ProductFilter::Id(id), &ADMIN_PRODUCT, media_base)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        tracing::info!(id, slug = %input.slug(), "product created");
        Ok(product)
    }

    /// Replace the product row and all of its specification links and images.
    pub async fn update(pool: &PgPool, id: i64, input: &ProductInput, media_base: &str) -> Result<Option<Value>, AppError> {
        let mut tx = pool.begin().await?;
        check_references(&mut tx, input).await?;
        let mut params = input.row_params();
        params.push(Value::from(id));
        if returned_id(fetch_optional(&mut *tx, &fixed(UPDATE_PRODUCT, params)).await?).is_none() {
            return Ok(None);
        }
        let id_param = vec![Value::from(id)];
        execute(&mut *tx, &fixed(DELETE_PRODUCT_SPECIFICATIONS, id_param.clone())).await?;
        execute(&mut *tx, &fixed(DELETE_PRODUCT_IMAGES, id_param)).await?;
        insert_children(&mut tx, id, input).await?;
        let product = Self::load(&mut *tx, &ProductFilter::Id(id), &ADMIN_PRODUCT, media_base)
            .await?
            .into_iter()
            .next();
        tx.commit().await?;
        tracing::info!(id, "product updated");
        Ok(product)
    }

    /// Soft delete. Children stay so the product can be restored intact.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<Option<Value>, AppError> {
        let row = fetch_optional(pool, &fixed(SOFT_DELETE_PRODUCT, vec![Value::from(id)])).await?;
        let Some(id) = returned_id(row) else {
            return Ok(None);
        };
        tracing::info!(id, "product deleted");
        Ok(Some(serde_json::json!({ "id": id })))
    }

    /// Set `product_category` or `new` alone. Body `{ "<flag>": value }`.
    pub async fn set_flag(
        pool: &PgPool,
        id: i64,
        flag: &str,
        body: &HashMap<String, Value>,
        media_base: &str,
    ) -> Result<Option<Value>, AppError> {
        let (name, kind) = PRODUCT_FLAGS
            .iter()
            .find(|(n, _)| *n == flag)
            .ok_or_else(|| AppError::NotFound(format!("products/{}", flag)))?;
        let raw = body
            .get(*name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| AppError::BadRequest(format!("{} is required", name)))?;
        let col = ColumnDef { name: *name, kind: *kind, required: true, has_default: false };
        let value = RequestValidator::coerce_column(&col, raw)?;
        let q = set_product_flag(name, &value, id).ok_or_else(|| AppError::NotFound(format!("products/{}", flag)))?;
        if returned_id(fetch_optional(pool, &q).await?).is_none() {
            return Ok(None);
        }
        tracing::info!(id, flag = *name, "product flag set");
        Self::read(pool, id, media_base).await
    }
}

async fn check_references(conn: &mut PgConnection, input: &ProductInput) -> Result<(), AppError> {
    let mut checks: Vec<(&str, &str, i64)> = Vec::new();
    if let Some(uid) = input.user_id {
        checks.push(("user_id", "users", uid));
    }
    if let Some(gid) = input.kept_images().first().and_then(|i| i.id) {
        checks.push(("images[0].id", "gallery", gid));
    }
    for sid in input.unique_specs() {
        checks.push(("specification_ids", "specification", sid));
    }
    for (field, table, id) in checks {
        if fetch_optional(&mut *conn, &exists(table, &Value::from(id))).await?.is_none() {
            return Err(AppError::Validation(format!("{} {} does not exist in {}", field, id, table)));
        }
    }
    Ok(())
}

async fn insert_children(conn: &mut PgConnection, id: i64, input: &ProductInput) -> Result<(), AppError> {
    for sid in input.unique_specs() {
        execute(&mut *conn, &fixed(INSERT_PRODUCT_SPECIFICATION, vec![Value::from(id), Value::from(sid)])).await?;
    }
    for img in input.kept_images() {
        let path = img.path.clone().map(Value::String).unwrap_or(Value::Null);
        execute(&mut *conn, &fixed(INSERT_PRODUCT_IMAGE, vec![Value::from(id), path])).await?;
    }
    Ok(())
}
