//! Gallery upload: store the file, then record it as a gallery row.

use crate::auth::AuthUser;
use crate::config::{Action, GALLERY};
use crate::error::AppError;
use crate::media::{build_url, upload_file_name, FileStore};
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// `POST /gallery/upload`: multipart with `file`, `user_id` and optional `image_id`.
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    user.require(&GALLERY.permission(Action::Create))?;

    let mut upload: Option<Upload> = None;
    let mut fields: HashMap<String, Value> = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                upload = Some(Upload { file_name, content_type, bytes: data.to_vec() });
            }
            "user_id" | "image_id" => {
                let text = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                fields.insert(name, Value::String(text));
            }
            _ => {}
        }
    }
    let upload = upload.ok_or_else(|| AppError::BadRequest("missing 'file' field in multipart body".into()))?;
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".into()));
    }
    if !fields.contains_key("user_id") {
        fields.insert("user_id".into(), Value::from(user.user_id()));
    }

    let key = upload_file_name(&upload.file_name, chrono::Utc::now());
    fields.insert("path".into(), Value::String(key.clone()));
    let body = RequestValidator::validate_create(&GALLERY, &fields)?;

    CrudService::verify_references(&state.pool, &GALLERY, &body).await?;
    let record = CrudService::create(&state.pool, &GALLERY, &body, state.media_base());
    let row = store_then_record(&*state.files, &key, upload.bytes, upload.content_type.as_deref(), record).await?;
    tracing::info!(key = %key, "gallery file stored");

    let url = build_url(state.media_base(), &key);
    Ok(crate::response::created(json!({ "file": key, "url": url, "image": row })))
}

/// Put the object, then run `record`. A failed `record` removes the object again.
async fn store_then_record<F>(
    files: &dyn FileStore,
    key: &str,
    bytes: Vec<u8>,
    content_type: Option<&str>,
    record: F,
) -> Result<Value, AppError>
where
    F: Future<Output = Result<Value, AppError>>,
{
    files.put(key, bytes, content_type).await?;
    match record.await {
        Ok(row) => Ok(row),
        Err(e) => {
            if let Err(cleanup) = files.delete(key).await {
                tracing::warn!(key, error = %cleanup, "orphaned upload not removed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MemoryFileStore;

    #[tokio::test]
    async fn failed_insert_removes_the_stored_object() {
        let store = MemoryFileStore::new();
        let record = async { Err(AppError::Validation("user_id 999 does not exist in users".into())) };
        let err = store_then_record(&store, "a.png", vec![1], None, record).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn successful_insert_keeps_the_object() {
        let store = MemoryFileStore::new();
        let record = async { Ok(json!({"id": 1})) };
        let row = store_then_record(&store, "a.png", vec![1, 2], Some("image/png"), record).await.unwrap();
        assert_eq!(row["id"], 1);
        assert_eq!(store.get("a.png"), Some(vec![1, 2]));
    }
}
