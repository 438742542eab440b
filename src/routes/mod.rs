//! Router assembly: common routes at the root, the API under `/api/v1`, plus CORS,
//! body limits and request tracing.

mod api;
mod common;

pub use api::api_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let base = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    base.allow_origin(AllowOrigin::list(list))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let limit = state.settings.upload_limit_bytes;
    Router::new()
        .merge(common_routes())
        .nest("/api/v1", api_routes())
        .layer(DefaultBodyLimit::max(limit))
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(cors_layer(&state.settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{token, SECRET};
    use crate::auth::TokenVerifier;
    use crate::config::{ResourceRegistry, Settings};
    use crate::media::MemoryFileStore;
    use crate::notify::{LogNotifier, Notifier};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(files: Arc<MemoryFileStore>) -> AppState {
        let settings = Settings { jwt_secret: SECRET.into(), ..Settings::default() };
        let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
        AppState {
            pool: PgPoolOptions::new()
                .acquire_timeout(Duration::from_millis(500))
                .connect_lazy(&settings.database_url)
                .unwrap(),
            tokens: Arc::new(TokenVerifier::new(&settings.jwt_secret, None)),
            settings: Arc::new(settings),
            registry: Arc::new(ResourceRegistry::standard().unwrap()),
            files,
            notifiers: Arc::new(notifiers),
        }
    }

    async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        send_to(state_with(Arc::new(MemoryFileStore::new())), req).await
    }

    async fn send_to(state: AppState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app(state).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().uri(uri);
        if let Some(t) = bearer {
            b = b.header("authorization", format!("Bearer {}", t));
        }
        b.body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, bearer: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", bearer))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let (status, body) = send(get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn admin_routes_need_a_token() {
        let (status, body) = send(get("/api/v1/banners", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden() {
        let t = token(&["Read gallery"], 3600);
        let (status, body) = send(get("/api/v1/banners", Some(&t))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "missing permission: Read banners");

        let (status, _) = send(get("/api/v1/products", Some(&t))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn generic_segment_sharing_a_static_prefix_still_routes() {
        let (status, _) = send(get("/api/v1/contacts", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_segment_is_not_found() {
        let t = token(&["Read banners"], 3600);
        let (status, body) = send(get("/api/v1/widgets", Some(&t))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn private_resources_have_no_public_view() {
        let (status, _) = send(get("/api/v1/public/permissions", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(get("/api/v1/public/contacts/1", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_permission_assignment_is_bad_request() {
        let t = token(&["Update Role Permissions"], 3600);
        let req = json_req("PUT", "/api/v1/role-permissions/assign/3", &t, serde_json::json!({"permission_ids": []}));
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn product_without_name_is_rejected() {
        let t = token(&["Create products"], 3600);
        let req = json_req("POST", "/api/v1/products", &t, serde_json::json!({"detail": "x"}));
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn unknown_flag_is_not_found() {
        let t = token(&["Update banners"], 3600);
        let req = json_req("PUT", "/api/v1/banners/1/title", &t, serde_json::json!({"title": "x"}));
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    const BOUNDARY: &str = "gallery-upload-boundary";

    /// Multipart upload request; a part with a file name is sent as a file.
    fn upload(bearer: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body: Vec<u8> = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let disposition = match file_name {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                    name, f
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/v1/gallery/upload")
            .header("authorization", format!("Bearer {}", bearer))
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_without_file_stores_nothing() {
        let files = Arc::new(MemoryFileStore::new());
        let t = token(&["Create gallery"], 3600);
        let req = upload(&t, &[("user_id", None, &b"7"[..])]);
        let (status, _) = send_to(state_with(files.clone()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let files = Arc::new(MemoryFileStore::new());
        let t = token(&["Create gallery"], 3600);
        let req = upload(&t, &[("file", Some("a.png"), &b""[..])]);
        let (status, _) = send_to(state_with(files.clone()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn upload_with_unverifiable_user_stores_nothing() {
        let files = Arc::new(MemoryFileStore::new());
        let t = token(&["Create gallery"], 3600);
        let req = upload(&t, &[("file", Some("a.png"), &b"\x89PNG"[..]), ("user_id", None, &b"999999"[..])]);
        let (status, _) = send_to(state_with(files.clone()), req).await;
        assert!(!status.is_success());
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn upload_needs_create_permission() {
        let files = Arc::new(MemoryFileStore::new());
        let t = token(&["Read gallery"], 3600);
        let req = upload(&t, &[("file", Some("a.png"), &b"\x89PNG"[..])]);
        let (status, _) = send_to(state_with(files.clone()), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(files.is_empty());
    }

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["https://a.example".to_string()]);
    }
}
