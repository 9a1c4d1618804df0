//! Reply handlers.

use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;
use uuid::Uuid;

use circle_api_types::ResponseBody;

use crate::application::replies::CreateReplyCommand;
use crate::application::sessions::Actor;
use crate::infra::uploads::UploadKind;

use super::super::error::ApiError;
use super::super::models::ListQuery;
use super::super::multipart::collect_form;
use super::super::state::ApiState;

pub async fn list_replies(
    State(state): State<ApiState>,
    Path(thread_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .replies
        .list_replies(thread_id, query.page_request(), query.sort())
        .await?;

    Ok(Json(ResponseBody::success("Fetch replies success", page)))
}

pub async fn create_reply(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(thread_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_form(multipart).await?;
    let content = form
        .text("content")
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("content is required", None))?;

    let mut stored_image = None;
    if let Some(file) = &form.file {
        let stored = state
            .upload_storage
            .store(UploadKind::Reply, &file.file_name, file.bytes.clone())
            .await
            .map_err(|err| ApiError::upload(err.to_string()))?;
        stored_image = Some(stored.stored_path);
    }

    let result = state
        .replies
        .create_reply(
            actor,
            thread_id,
            CreateReplyCommand {
                content,
                image: stored_image.clone(),
            },
        )
        .await;

    let reply = match result {
        Ok(reply) => reply,
        Err(err) => {
            if let Some(path) = stored_image
                && let Err(unlink_err) = state.upload_storage.delete(&path).await
            {
                warn!(path = %path, error = %unlink_err, "failed to remove orphaned reply image");
            }
            return Err(err.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::success("Create reply success", reply)),
    ))
}

pub async fn delete_reply(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.replies.delete_reply(actor, id).await?;

    if let Some(path) = deleted.image
        && let Err(err) = state.upload_storage.delete(&path).await
    {
        warn!(path = %path, error = %err, "failed to remove deleted reply image");
    }

    Ok(Json(ResponseBody::message_only(format!(
        "Delete reply {id} success"
    ))))
}
