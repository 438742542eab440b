//! Database bootstrap: create the database if missing, then the tables (idempotent).

use crate::error::AppError;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Content-table tail shared by every admin-managed table.
const AUDIT_COLUMNS: &str = r#"
    "status" SMALLINT NOT NULL DEFAULT 1,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()"#;

/// Tables in dependency order. `{audit}` expands to [`AUDIT_COLUMNS`].
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"CREATE TABLE IF NOT EXISTS "users" (
    "id" BIGSERIAL PRIMARY KEY,
    "name" TEXT NOT NULL,
    "email" TEXT NOT NULL UNIQUE,
    "role" TEXT,{audit}
)"#,
    ),
    (
        "permission",
        r#"CREATE TABLE IF NOT EXISTS "permission" (
    "id" BIGSERIAL PRIMARY KEY,
    "name" TEXT NOT NULL UNIQUE,{audit}
)"#,
    ),
    (
        "user_permission",
        r#"CREATE TABLE IF NOT EXISTS "user_permission" (
    "id" BIGSERIAL PRIMARY KEY,
    "user_id" BIGINT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
    "permission_id" BIGINT NOT NULL REFERENCES "permission"("id") ON DELETE CASCADE,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE ("user_id", "permission_id")
)"#,
    ),
    (
        "gallery",
        r#"CREATE TABLE IF NOT EXISTS "gallery" (
    "id" BIGSERIAL PRIMARY KEY,
    "path" TEXT NOT NULL,
    "image_id" BIGINT,
    "user_id" BIGINT REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "banner",
        r#"CREATE TABLE IF NOT EXISTS "banner" (
    "id" BIGSERIAL PRIMARY KEY,
    "image_id" BIGINT REFERENCES "gallery"("id"),
    "title" TEXT,
    "path" TEXT,
    "user_id" BIGINT NOT NULL REFERENCES "users"("id"),
    "type" SMALLINT,{audit}
)"#,
    ),
    (
        "mission",
        r#"CREATE TABLE IF NOT EXISTS "mission" (
    "id" BIGSERIAL PRIMARY KEY,
    "mission" TEXT,
    "value" TEXT,
    "history" TEXT,
    "image_id" BIGINT REFERENCES "gallery"("id"),
    "path" TEXT,
    "user_id" BIGINT REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "welcome",
        r#"CREATE TABLE IF NOT EXISTS "welcome" (
    "id" BIGSERIAL PRIMARY KEY,
    "title" TEXT,
    "detail" TEXT,
    "image_id" BIGINT REFERENCES "gallery"("id"),
    "path" TEXT,
    "banner_id" BIGINT REFERENCES "banner"("id"),
    "user_id" BIGINT NOT NULL REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "industry_development",
        r#"CREATE TABLE IF NOT EXISTS "industry_development" (
    "id" BIGSERIAL PRIMARY KEY,
    "year" INTEGER,
    "title" TEXT NOT NULL,
    "image_id" BIGINT NOT NULL REFERENCES "gallery"("id"),
    "path" TEXT,
    "user_id" BIGINT NOT NULL REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "profile_ceo",
        r#"CREATE TABLE IF NOT EXISTS "profile_ceo" (
    "id" BIGSERIAL PRIMARY KEY,
    "image_id" BIGINT NOT NULL REFERENCES "gallery"("id"),
    "path" TEXT,
    "name" TEXT NOT NULL,
    "detail" TEXT,
    "user_id" BIGINT NOT NULL REFERENCES "users"("id"),
    "testimonial" TEXT,
    "testimonial_title" TEXT,
    "testimonial_descriptions" TEXT,
    "publisher" SMALLINT,{audit}
)"#,
    ),
    (
        "solution",
        r#"CREATE TABLE IF NOT EXISTS "solution" (
    "id" BIGSERIAL PRIMARY KEY,
    "category" TEXT,
    "category_sub" TEXT,
    "title" TEXT NOT NULL,
    "image_id" BIGINT NOT NULL REFERENCES "gallery"("id"),
    "path" TEXT,
    "user_id" BIGINT NOT NULL REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "specification",
        r#"CREATE TABLE IF NOT EXISTS "specification" (
    "id" BIGSERIAL PRIMARY KEY,
    "title" TEXT NOT NULL,
    "descriptions" TEXT,
    "user_id" BIGINT REFERENCES "users"("id"),{audit}
)"#,
    ),
    (
        "product",
        r#"CREATE TABLE IF NOT EXISTS "product" (
    "id" BIGSERIAL PRIMARY KEY,
    "category" TEXT,
    "category_sub" TEXT,
    "product_category" TEXT,
    "name" TEXT NOT NULL,
    "slug" TEXT NOT NULL,
    "new" SMALLINT NOT NULL DEFAULT 0,
    "image_id" BIGINT REFERENCES "gallery"("id"),
    "path" TEXT,
    "detail" TEXT,
    "user_id" BIGINT REFERENCES "users"("id"),
    "category_id" BIGINT,{audit}
)"#,
    ),
    (
        "product_specification",
        r#"CREATE TABLE IF NOT EXISTS "product_specification" (
    "id" BIGSERIAL PRIMARY KEY,
    "product_id" BIGINT NOT NULL REFERENCES "product"("id") ON DELETE CASCADE,
    "specification_id" BIGINT NOT NULL REFERENCES "specification"("id")
)"#,
    ),
    (
        "product_images",
        r#"CREATE TABLE IF NOT EXISTS "product_images" (
    "id" BIGSERIAL PRIMARY KEY,
    "product_id" BIGINT NOT NULL REFERENCES "product"("id") ON DELETE CASCADE,
    "image_path" TEXT NOT NULL,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    ),
    (
        "contact_us",
        r#"CREATE TABLE IF NOT EXISTS "contact_us" (
    "id" BIGSERIAL PRIMARY KEY,
    "name" TEXT NOT NULL,
    "email" TEXT NOT NULL,
    "subject" TEXT,
    "message" TEXT NOT NULL,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    ),
];

const INDEXES: &[&str] = &[
    r#"CREATE INDEX IF NOT EXISTS "product_slug_idx" ON "product" ("slug")"#,
    r#"CREATE INDEX IF NOT EXISTS "product_specification_product_idx" ON "product_specification" ("product_id")"#,
    r#"CREATE INDEX IF NOT EXISTS "product_images_product_idx" ON "product_images" ("product_id")"#,
];

fn table_ddl(template: &str) -> String {
    template.replace("{audit}", AUDIT_COLUMNS)
}

/// Create every table and index that does not exist yet. Safe to run on each start.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    for (name, template) in TABLES {
        sqlx::query(&table_ddl(template)).execute(pool).await?;
        tracing::debug!(table = name, "table ensured");
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!(tables = TABLES.len(), "schema ready");
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

/// Split `postgres://host/db?opts` into (`postgres://host/postgres`, `db`).
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
