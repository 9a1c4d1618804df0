//! Thread handlers.

use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;
use uuid::Uuid;

use circle_api_types::ResponseBody;

use crate::application::sessions::Actor;
use crate::application::threads::CreateThreadCommand;
use crate::infra::uploads::UploadKind;

use super::super::error::ApiError;
use super::super::models::ListQuery;
use super::super::multipart::collect_form;
use super::super::state::ApiState;

pub async fn list_threads(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .threads
        .list_feed(actor, query.page_request(), query.sort())
        .await?;

    Ok(Json(ResponseBody::success("Fetch threads success", page)))
}

pub async fn get_thread(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = state.threads.get_thread(actor, id).await?;
    Ok(Json(ResponseBody::success("Fetch thread success", thread)))
}

pub async fn create_thread(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
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
            .store(UploadKind::Thread, &file.file_name, file.bytes.clone())
            .await
            .map_err(|err| ApiError::upload(err.to_string()))?;
        stored_image = Some(stored.stored_path);
    }

    let result = state
        .threads
        .create_thread(
            actor,
            CreateThreadCommand {
                content,
                image: stored_image.clone(),
            },
        )
        .await;

    let thread = match result {
        Ok(thread) => thread,
        Err(err) => {
            if let Some(path) = stored_image
                && let Err(unlink_err) = state.upload_storage.delete(&path).await
            {
                warn!(path = %path, error = %unlink_err, "failed to remove orphaned thread image");
            }
            return Err(err.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::success("Create thread success", thread)),
    ))
}

pub async fn delete_thread(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.threads.delete_thread(actor, id).await?;

    // The rows are gone; stored files go best-effort afterwards.
    for path in deleted.images {
        if let Err(err) = state.upload_storage.delete(&path).await {
            warn!(path = %path, error = %err, "failed to remove deleted thread image");
        }
    }

    Ok(Json(ResponseBody::message_only(format!(
        "Delete thread {id} success"
    ))))
}
