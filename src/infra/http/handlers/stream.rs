//! Live mutation-event stream (SSE).

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::{Extension, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use circle_api_types::MutationEvent;

use crate::application::sessions::Actor;

use super::super::state::ApiState;

/// Subscribe to the fan-out channel.
///
/// Authentication happened at connection time via the session cookie;
/// from here on every broadcast event is forwarded unfiltered, named by
/// its kind, with the kind's payload as the event data. Clients discard
/// what does not concern their views. Disconnecting simply drops the
/// receiver.
pub async fn subscribe(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.fanout.subscribe();
    info!(user_id = %actor.id, "event stream subscriber connected");

    let stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => match sse_event(&event) {
                    Ok(rendered) => yield Ok(rendered),
                    Err(err) => warn!(error = %err, "failed to render mutation event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    // Within the at-most-once contract: the client will
                    // catch up on its next cold read.
                    warn!(skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event(event: &MutationEvent) -> Result<Event, axum::Error> {
    let value = serde_json::to_value(event).map_err(axum::Error::new)?;
    let payload = value
        .get("payload")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    Event::default().event(event.kind()).json_data(payload)
}
