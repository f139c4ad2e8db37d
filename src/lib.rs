//! Blog administration backend: login, categories, contents, user profile
//! and image upload over MySQL and an S3-compatible bucket.

pub mod auth;
pub mod categories;
pub mod config;
pub mod contents;
pub mod database;
pub mod error;
pub mod health;
pub mod image;
pub mod listing;
pub mod models;
pub mod password;
pub mod repository;
pub mod response;
pub mod slug;
pub mod state;
pub mod storage;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted image.
const UPLOAD_BODY_LIMIT: usize = crate::image::MAX_IMAGE_SIZE + 64 * 1024;

/// Runs a blocking repository call off the async runtime.
pub async fn run_blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

pub fn router(state: AppState) -> Router {
    let categories = Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/create", post(categories::create_category))
        .route(
            "/:id",
            get(categories::get_category)
                .put(categories::edit_category)
                .delete(categories::delete_category),
        );

    let contents = Router::new()
        .route(
            "/",
            get(contents::list_contents).post(contents::create_content),
        )
        .route("/create", post(contents::create_content))
        .route(
            "/upload-image",
            post(crate::image::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/:id",
            get(contents::get_content)
                .put(contents::edit_content)
                .delete(contents::delete_content),
        );

    let users = Router::new()
        .route("/profile", get(users::get_profile))
        .route("/update-password", put(users::update_password));

    let admin = Router::new()
        .nest("/categories", categories)
        .nest("/contents", contents)
        .nest("/users", users)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/categories", get(categories::list_categories))
        .route("/contents", get(contents::list_published_contents))
        .route("/contents/:id", get(contents::get_published_content));

    let api = Router::new()
        .route("/healthcheck", get(health::health_check_handler))
        .route("/login", post(auth::login))
        .nest("/admin", admin)
        .nest("/fe", public);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
