//! Follow toggle and follow-list handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use circle_api_types::ResponseBody;

use crate::application::sessions::Actor;

use super::super::error::ApiError;
use super::super::models::ListQuery;
use super::super::state::ApiState;

pub async fn toggle_follow(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.follows.toggle(actor, id).await?;

    let message = if outcome.following {
        "Following created"
    } else {
        "Following removed"
    };
    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::success(
            message,
            json!({ "following": outcome.following }),
        )),
    ))
}

pub async fn follow_counts(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state.follows.counts(id).await?;
    Ok(Json(ResponseBody::success("Fetch counts success", counts)))
}

pub async fn list_suggested(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .follows
        .list_suggested(actor, id, query.page_request(), query.sort())
        .await?;
    Ok(Json(ResponseBody::success("Fetch suggestions success", page)))
}

pub async fn list_following(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .follows
        .list_following(actor, id, query.page_request(), query.sort())
        .await?;
    Ok(Json(ResponseBody::success("Fetch following success", page)))
}

pub async fn list_followers(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .follows
        .list_followers(actor, id, query.page_request(), query.sort())
        .await?;
    Ok(Json(ResponseBody::success("Fetch followers success", page)))
}
