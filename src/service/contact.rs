//! Contact-form submissions: stored first, then forwarded to the notifiers.

use super::crud::CrudService;
use super::validation::RequestValidator;
use crate::config::CONTACT;
use crate::error::AppError;
use crate::notify::{broadcast, ContactMessage, Notifier};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ContactService;

impl ContactService {
    /// Validate and insert the submission, then notify in the background. Notification
    /// failures are logged by [`broadcast`] and never reach the caller.
    pub async fn submit(
        pool: &PgPool,
        notifiers: Arc<Vec<Arc<dyn Notifier>>>,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let body = RequestValidator::validate_create(&CONTACT, body)?;
        let msg = message_from(&body);
        let row = CrudService::create(pool, &CONTACT, &body, "").await?;
        tokio::spawn(async move {
            let failed = broadcast(&notifiers, &msg).await;
            if failed > 0 {
                tracing::warn!(failed, total = notifiers.len(), "some contact notifications failed");
            }
        });
        Ok(row)
    }
}

fn message_from(body: &HashMap<String, Value>) -> ContactMessage {
    let text = |k: &str| body.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
    ContactMessage {
        name: text("name"),
        email: text("email"),
        subject: text("subject"),
        message: text("message"),
    }
}
