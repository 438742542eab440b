//! Showcase admin: CRUD backend for a marketing site's content, with nested product assembly.

pub mod assemble;
pub mod auth;
pub mod config;
pub mod error;
mod extractors;
pub mod handlers;
pub mod media;
pub mod notify;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use assemble::{assemble, assemble_json, AssemblySpec, ChildShape, FieldMap, JoinRow, RelationSpec, Resource};
pub use auth::{AuthUser, Claims, TokenVerifier};
pub use config::{ResourceDef, ResourceRegistry, Settings};
pub use error::{AppError, AssembleError, ConfigError};
pub use media::{FileStore, MemoryFileStore, S3FileStore};
pub use notify::Notifier;
pub use routes::{api_routes, app, common_routes};
pub use service::{CatalogService, CrudService};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_schema};
