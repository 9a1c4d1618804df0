//! Stored-image serving.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use super::super::error::ApiError;
use super::super::state::ApiState;

/// Serve a stored upload by its relative path. The storage layer
/// rejects traversal before any filesystem access happens.
pub async fn serve_upload(
    State(state): State<ApiState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state
        .upload_storage
        .read(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        bytes,
    ))
}
