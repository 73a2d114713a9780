pub mod error;
mod handlers;
mod middleware;
pub mod session;
mod session_store;
mod state;

pub use state::{HttpState, SiteOptions};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use self::middleware::{log_responses, set_request_context};
use self::session::session_layer;

/// Upper bound for multipart post forms including the image.
const POST_FORM_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: HttpState) -> Router {
    let secure_cookies = state.site.secure_cookies;

    let admin = Router::new()
        .route(
            "/api/admin/posts",
            get(handlers::admin_posts)
                .post(handlers::create_post)
                .layer(DefaultBodyLimit::max(POST_FORM_BODY_LIMIT)),
        )
        .route(
            "/api/admin/posts/{id}",
            get(handlers::admin_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post)
                .layer(DefaultBodyLimit::max(POST_FORM_BODY_LIMIT)),
        )
        .route("/api/admin/categories", post(handlers::create_category))
        .route("/api/admin/stats", get(handlers::admin_stats));

    Router::new()
        .route("/", get(handlers::home_feed))
        .route("/api/posts", get(handlers::home_feed))
        .route("/post/{id}", get(handlers::post_detail))
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/session", get(handlers::current_session))
        .route(
            "/api/preferences/notifications",
            get(handlers::notification_preference).put(handlers::update_notification_preference),
        )
        .route("/auth/login", get(handlers::login))
        .route("/auth/callback", get(handlers::callback))
        .route("/auth/logout", post(handlers::logout))
        .route("/healthz", get(handlers::health))
        .merge(admin)
        .with_state(state)
        .layer(session_layer(secure_cookies))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
