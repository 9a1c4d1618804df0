//! Account and profile handlers.

use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use circle_api_types::ResponseBody;

use crate::application::sessions::{Actor, SESSION_COOKIE};
use crate::application::users::{
    LoginCommand, PhotoChange, RegisterCommand, UpdateUserCommand,
};
use crate::infra::uploads::UploadKind;

use super::super::error::ApiError;
use super::super::models::{ListQuery, LoginRequest, RegisterRequest, ResetPasswordRequest};
use super::super::multipart::collect_form;
use super::super::state::ApiState;

pub async fn register(
    State(state): State<ApiState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .users
        .register(RegisterCommand {
            full_name: payload.full_name,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::message_only(format!(
            "Create user {} success",
            record.full_name
        ))),
    ))
}

pub async fn login(
    State(state): State<ApiState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = state
        .users
        .login(LoginCommand {
            identifier: payload.identifier,
            password: payload.password,
        })
        .await?;

    let cookie = session_cookie(token, state.sessions.ttl(), state.secure_cookies);
    Ok((
        jar.add(cookie),
        Json(ResponseBody::success(
            "Login success",
            json!({ "id": user.id }),
        )),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (
        jar.remove(removal),
        Json(ResponseBody::message_only("Logout successful")),
    )
}

pub async fn verify(Extension(actor): Extension<Actor>) -> impl IntoResponse {
    Json(ResponseBody::success(
        "Fetch user success",
        json!({ "id": actor.id }),
    ))
}

pub async fn list_users(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .users
        .list_users(
            actor,
            query.search.clone(),
            query.page_request(),
            query.sort(),
        )
        .await?;

    Ok(Json(ResponseBody::success("Fetch users success", page)))
}

pub async fn get_user(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get_user(id).await?;
    Ok(Json(ResponseBody::success("Fetch user success", user)))
}

pub async fn update_user(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_form(multipart).await?;
    let full_name = form
        .text("full_name")
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("full_name is required", None))?;

    let mut stored_photo = None;
    let photo = if form.text("remove") == Some("ok") {
        PhotoChange::Remove
    } else if let Some(file) = &form.file {
        let stored = state
            .upload_storage
            .store(UploadKind::User, &file.file_name, file.bytes.clone())
            .await
            .map_err(|err| ApiError::upload(err.to_string()))?;
        stored_photo = Some(stored.stored_path.clone());
        PhotoChange::Replace(stored.stored_path)
    } else {
        PhotoChange::Keep
    };

    let result = state
        .users
        .update_user(
            actor,
            id,
            UpdateUserCommand {
                username: form.text("username").map(str::to_string),
                full_name,
                bio: form.text("bio").map(str::to_string),
                photo,
            },
        )
        .await;

    let updated = match result {
        Ok(updated) => updated,
        Err(err) => {
            // The profile write failed; do not leave the new photo behind.
            if let Some(path) = stored_photo
                && let Err(unlink_err) = state.upload_storage.delete(&path).await
            {
                warn!(path = %path, error = %unlink_err, "failed to remove orphaned photo");
            }
            return Err(err.into());
        }
    };

    if let Some(path) = updated.replaced_photo
        && let Err(err) = state.upload_storage.delete(&path).await
    {
        warn!(path = %path, error = %err, "failed to remove replaced photo");
    }

    Ok(Json(ResponseBody::success(
        format!("Update user {} success", updated.user.full_name),
        updated.user,
    )))
}

pub async fn reset_password(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .users
        .reset_password(actor, id, &payload.password, &payload.new_password)
        .await?;

    Ok(Json(ResponseBody::message_only("Password reset success")))
}

fn session_cookie(token: String, ttl: time::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(ttl)
        .build()
}
