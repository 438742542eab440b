//! User-permission assignment queries.

pub const DELETE_USER_PERMISSIONS: &str = r#"DELETE FROM "user_permission" WHERE "user_id" = $1::int8"#;

pub const INSERT_USER_PERMISSION: &str = r#"INSERT INTO "user_permission" ("user_id", "permission_id", "created_at", "updated_at")
VALUES ($1::int8, $2::int8, NOW(), NOW())"#;

/// Active permissions, each flagged with whether the user holds it.
pub const SELECT_USER_PERMISSIONS: &str = r#"SELECT
    p."id",
    p."name",
    EXISTS (
        SELECT 1 FROM "user_permission" up
        WHERE up."user_id" = $1::int8 AND up."permission_id" = p."id"
    ) AS "assigned"
FROM "permission" p
WHERE p."status" = 1
ORDER BY p."id""#;

/// Ids from `$1` that have no active permission row.
pub const MISSING_PERMISSIONS: &str = r#"SELECT ids."id"
FROM UNNEST($1::int8[]) AS ids("id")
WHERE NOT EXISTS (SELECT 1 FROM "permission" p WHERE p."id" = ids."id" AND p."status" = 1)
ORDER BY ids."id""#;
