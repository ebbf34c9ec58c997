use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, image_handler, item_handler};
use crate::middleware::AuthLayer;
use crate::services::{ItemService, StorageService};

/// Shared handles for every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub items: Arc<ItemService>,
    pub storage: Arc<StorageService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(items: ItemService, storage: StorageService, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            items: Arc::new(items),
            storage: Arc::new(storage),
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// `/health` is public; everything under `/api/v1` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/items",
            post(item_handler::create_item).get(item_handler::list_items),
        )
        .route("/items/search", get(item_handler::search_items))
        .route(
            "/items/:id",
            get(item_handler::get_item)
                .put(item_handler::update_item)
                .delete(item_handler::delete_item),
        )
        .route(
            "/items/:id/images",
            post(image_handler::upload_item_image)
                .layer(DefaultBodyLimit::max(image_handler::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/items/:id/images/upload-url",
            post(image_handler::signed_upload_url),
        )
        .route("/images/:id", delete(image_handler::delete_image))
        .route_layer(AuthLayer::new(state.jwt_secret.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
