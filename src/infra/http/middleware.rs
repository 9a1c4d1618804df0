use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use tracing::{info, warn};

use crate::application::sessions::{SESSION_COOKIE, SessionError};

use super::error::ApiError;
use super::state::ApiState;

/// Resolve the session cookie into an [`Actor`] extension, or reject.
///
/// [`Actor`]: crate::application::sessions::Actor
pub async fn session_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return ApiError::unauthorized("you must log in first").into_response();
    };

    let actor = match state.sessions.verify(cookie.value()) {
        Ok(actor) => actor,
        Err(SessionError::Expired) => {
            return ApiError::unauthorized("session expired, log in again").into_response();
        }
        Err(_) => {
            return ApiError::unauthorized("invalid session token").into_response();
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Log one line per response, warning on error statuses.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() || status.is_client_error() {
        warn!(%method, path = %path, status = status.as_u16(), "request failed");
    } else {
        info!(%method, path = %path, status = status.as_u16(), "request handled");
    }

    response
}
