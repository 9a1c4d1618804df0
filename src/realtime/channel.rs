//! Broadcast channel for mutation events.

use circle_api_types::MutationEvent;
use metrics::counter;
use tokio::sync::broadcast;
use tracing::info;

const METRIC_EVENTS_PUBLISHED: &str = "circle_events_published_total";

const DEFAULT_CAPACITY: usize = 256;

/// Publish/subscribe transport pushing mutation events to every
/// connected client.
///
/// Events are broadcast to all subscribers regardless of who they
/// concern; filtering is each subscriber's job. This trades payload
/// exposure for simplicity, a known limitation kept deliberately. A
/// slow subscriber that falls more than the channel capacity behind is
/// lagged by the broadcast primitive and misses events, which is within
/// the at-most-once contract.
#[derive(Clone)]
pub struct FanoutChannel {
    sender: broadcast::Sender<MutationEvent>,
}

impl FanoutChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to every current subscriber, best-effort.
    ///
    /// Having no subscribers is not a failure; the event is simply
    /// dropped. Callers never wait on delivery.
    pub fn publish(&self, event: MutationEvent) {
        let kind = event.kind();
        let receivers = self.sender.receiver_count();
        // send() only errs when no receiver exists, i.e. a quiet channel.
        let _ = self.sender.send(event);

        counter!(METRIC_EVENTS_PUBLISHED, "kind" => kind).increment(1);
        info!(kind, receivers, "Mutation event published");
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FanoutChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let channel = FanoutChannel::default();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        channel.publish(MutationEvent::ThreadDeleted { id: Uuid::nil() });

        let event = first.recv().await.expect("first subscriber receives");
        assert_eq!(event.kind(), "ThreadDeleted");
        let event = second.recv().await.expect("second subscriber receives");
        assert_eq!(event.kind(), "ThreadDeleted");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let channel = FanoutChannel::default();
        channel.publish(MutationEvent::ThreadDeleted { id: Uuid::nil() });
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let channel = FanoutChannel::default();
        channel.publish(MutationEvent::ThreadDeleted { id: Uuid::nil() });

        let mut late = channel.subscribe();
        channel.publish(MutationEvent::ThreadDeleted { id: Uuid::new_v4() });

        // Only the post-subscribe event arrives.
        let event = late.recv().await.expect("one event queued");
        assert!(matches!(
            event,
            MutationEvent::ThreadDeleted { id } if !id.is_nil()
        ));
        assert!(late.try_recv().is_err());
    }
}
