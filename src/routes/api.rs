//! `/api/v1` routes. Static segments (`products`, `public`, `gallery/upload`, ...) take
//! priority over the generic `/:path_segment` routes.

use crate::handlers::{access, contact, gallery, product, resource};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // products (assembled from joins)
        .route("/products", get(product::list).post(product::create))
        .route(
            "/products/:id",
            get(product::read).put(product::update).delete(product::delete),
        )
        .route("/products/:id/:flag", put(product::set_flag))
        .route("/public/products", get(product::public_list))
        .route("/public/products/slug/:slug", get(product::public_by_slug))
        // access
        .route("/role-permissions/assign/:user_id", put(access::assign))
        .route("/role-permissions/user/:user_id", get(access::for_user))
        // uploads and contact form
        .route("/gallery/upload", post(gallery::upload))
        .route("/contact", post(contact::submit))
        // generic resources
        .route("/public/:path_segment", get(resource::public_list))
        .route("/public/:path_segment/:id", get(resource::public_read))
        .route("/:path_segment", get(resource::list).post(resource::create))
        .route(
            "/:path_segment/:id",
            get(resource::read).put(resource::update).delete(resource::delete),
        )
        .route("/:path_segment/:id/:field", put(resource::set_flag))
}
