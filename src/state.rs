//! Shared application state for all routes.

use crate::auth::TokenVerifier;
use crate::config::{ResourceRegistry, Settings};
use crate::media::FileStore;
use crate::notify::Notifier;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    /// Generic resources keyed by path segment.
    pub registry: Arc<ResourceRegistry>,
    pub files: Arc<dyn FileStore>,
    pub notifiers: Arc<Vec<Arc<dyn Notifier>>>,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    pub fn media_base(&self) -> &str {
        &self.settings.media_base_url
    }
}
