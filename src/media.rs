//! Media paths: absolute URL building and the object store that receives uploads.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// Absolute URL for a stored media path.
///
/// A path already under `base` (the base itself, or base then `/`) is re-rooted (no doubled domain), other absolute
/// http(s) URLs pass through, leading slashes are dropped. Empty paths have no URL.
pub fn build_url(base: &str, path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let base = base.trim_end_matches('/');
    let under_base = (!base.is_empty())
        .then(|| path.strip_prefix(base))
        .flatten()
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));
    let relative = if let Some(rest) = under_base {
        rest
    } else if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    } else {
        path
    };
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        return Some(relative.to_string());
    }
    Some(format!("{}/{}", base, relative))
}

/// Rewrite the named string columns of a row object in place. Non-string values become null.
pub fn rewrite_media(row: &mut Map<String, Value>, columns: &[&str], base: &str) {
    for col in columns {
        if let Some(v) = row.get_mut(*col) {
            *v = v
                .as_str()
                .and_then(|p| build_url(base, p))
                .map(Value::String)
                .unwrap_or(Value::Null);
        }
    }
}

/// Object name for an upload: `YYYYMMDDHHMMSS_<name>`, the name reduced to `[A-Za-z0-9._-]`.
pub fn upload_file_name(original: &str, now: DateTime<Utc>) -> String {
    let base = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(original);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    let cleaned = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("{}_{}", now.format("%Y%m%d%H%M%S"), cleaned)
}

/// Destination for uploaded media. Keys are relative to the media base URL.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<(), AppError>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// S3 (or S3-compatible) bucket; objects land under `prefix/`.
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3FileStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        S3FileStore {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Client from the default AWS credential/region chain (env, profile, instance metadata).
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, prefix)
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<(), AppError> {
        let object_key = self.object_key(key);
        tracing::debug!(bucket = %self.bucket, key = %object_key, size = bytes.len(), "s3 put");
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send().await.map_err(|e| {
            tracing::warn!(bucket = %self.bucket, key = %object_key, error = %e, "s3 upload failed");
            AppError::Storage(format!("upload of {} failed", key))
        })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(bucket = %self.bucket, key = %object_key, error = %e, "s3 delete failed");
                AppError::Storage(format!("delete of {} failed", key))
            })?;
        Ok(())
    }
}

/// In-process store, used when no bucket is configured and in tests.
#[derive(Default)]
pub struct MemoryFileStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<(), AppError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| AppError::Storage("memory store poisoned".into()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| AppError::Storage("memory store poisoned".into()))?;
        objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const BASE: &str = "https://example.com/uploads";

    #[test]
    fn joins_relative_paths() {
        assert_eq!(build_url(BASE, "a.jpg").as_deref(), Some("https://example.com/uploads/a.jpg"));
        assert_eq!(build_url(BASE, "/a.jpg").as_deref(), Some("https://example.com/uploads/a.jpg"));
        assert_eq!(build_url("https://example.com/uploads/", "a.jpg").as_deref(), Some("https://example.com/uploads/a.jpg"));
    }

    #[test]
    fn does_not_double_the_base() {
        assert_eq!(
            build_url(BASE, "https://example.com/uploads/a.jpg").as_deref(),
            Some("https://example.com/uploads/a.jpg")
        );
    }

    #[test]
    fn sibling_of_the_base_is_not_rewritten() {
        assert_eq!(
            build_url(BASE, "https://example.com/uploads-old/a.jpg").as_deref(),
            Some("https://example.com/uploads-old/a.jpg")
        );
        assert_eq!(build_url(BASE, BASE).as_deref(), Some("https://example.com/uploads/"));
    }

    #[test]
    fn foreign_urls_pass_through() {
        assert_eq!(build_url(BASE, "https://cdn.other/x.png").as_deref(), Some("https://cdn.other/x.png"));
    }

    #[test]
    fn empty_path_has_no_url() {
        assert_eq!(build_url(BASE, ""), None);
        assert_eq!(build_url(BASE, "   "), None);
    }

    #[test]
    fn rewrites_only_named_columns() {
        let mut row = json!({"path": "a.jpg", "gallery_path": null, "title": "b.jpg"})
            .as_object()
            .unwrap()
            .clone();
        rewrite_media(&mut row, &["path", "gallery_path"], BASE);
        assert_eq!(row["path"], json!("https://example.com/uploads/a.jpg"));
        assert_eq!(row["gallery_path"], Value::Null);
        assert_eq!(row["title"], json!("b.jpg"));
    }

    #[test]
    fn upload_names_are_timestamped_and_sanitized() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(upload_file_name("../My Photo (1).jpg", now), "20250304050607_My_Photo__1_.jpg");
        assert_eq!(upload_file_name("", now), "20250304050607_upload");
    }

    #[tokio::test]
    async fn memory_store_keeps_bytes() {
        let store = MemoryFileStore::new();
        store.put("a.jpg", vec![1, 2, 3], Some("image/jpeg")).await.unwrap();
        assert_eq!(store.get("a.jpg"), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
        store.delete("a.jpg").await.unwrap();
        store.delete("a.jpg").await.unwrap();
        assert!(store.is_empty());
    }
}
