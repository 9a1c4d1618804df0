//! HTTP surface: router, state, middleware, handlers.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod multipart;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post},
};

/// Assemble the full `/api/v1` router.
///
/// Register, login, logout and stored-image serving are reachable
/// without a session; everything else sits behind the session-cookie
/// middleware, which attaches the [`Actor`] extension handlers rely on.
///
/// [`Actor`]: crate::application::sessions::Actor
pub fn build_router(state: ApiState, upload_body_limit: usize) -> Router {
    let public = Router::new()
        .route("/api/v1/register", post(handlers::users::register))
        .route("/api/v1/login", post(handlers::users::login))
        .route("/api/v1/logout", post(handlers::users::logout))
        .route("/api/v1/uploads/{*path}", get(handlers::uploads::serve_upload));

    let authed = Router::new()
        .route("/api/v1/verify", get(handlers::users::verify))
        .route("/api/v1/users", get(handlers::users::list_users))
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::get_user).patch(handlers::users::update_user),
        )
        .route(
            "/api/v1/users/{id}/reset-password",
            patch(handlers::users::reset_password),
        )
        .route(
            "/api/v1/threads",
            get(handlers::threads::list_threads).post(handlers::threads::create_thread),
        )
        .route(
            "/api/v1/threads/{id}",
            get(handlers::threads::get_thread).delete(handlers::threads::delete_thread),
        )
        .route(
            "/api/v1/threads/{id}/replies",
            get(handlers::replies::list_replies).post(handlers::replies::create_reply),
        )
        .route("/api/v1/replies/{id}", axum::routing::delete(handlers::replies::delete_reply))
        .route("/api/v1/threads/{id}/likes", post(handlers::likes::toggle_like))
        .route("/api/v1/follows/{id}", post(handlers::follows::toggle_follow))
        .route(
            "/api/v1/follows/{id}/count",
            get(handlers::follows::follow_counts),
        )
        .route(
            "/api/v1/follows/{id}/suggested",
            get(handlers::follows::list_suggested),
        )
        .route(
            "/api/v1/follows/{id}/following",
            get(handlers::follows::list_following),
        )
        .route(
            "/api/v1/follows/{id}/followers",
            get(handlers::follows::list_followers),
        )
        .route("/api/v1/stream", get(handlers::stream::subscribe))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_auth,
        ))
        .layer(DefaultBodyLimit::max(upload_body_limit));

    public
        .merge(authed)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .with_state(state)
}
