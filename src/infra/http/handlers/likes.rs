//! Like toggle handler.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use circle_api_types::ResponseBody;

use crate::application::sessions::Actor;

use super::super::error::ApiError;
use super::super::state::ApiState;

pub async fn toggle_like(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(thread_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.likes.toggle(actor, thread_id).await?;

    let message = if outcome.liked {
        "Like created"
    } else {
        "Like removed"
    };
    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::success(
            message,
            json!({ "liked": outcome.liked, "count": outcome.count }),
        )),
    ))
}
