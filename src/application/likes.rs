//! Like toggling.

use std::sync::Arc;

use circle_api_types::MutationEvent;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{LikesRepo, ThreadsRepo};
use crate::application::sessions::Actor;
use crate::realtime::FanoutChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub count: i64,
}

/// Toggles like rows. Like mutations publish events but evict nothing:
/// like counts inside cached thread pages heal on TTL expiry, and live
/// clients get the fresh count from the event itself.
pub struct LikeService {
    likes: Arc<dyn LikesRepo>,
    threads: Arc<dyn ThreadsRepo>,
    fanout: FanoutChannel,
}

impl LikeService {
    pub fn new(
        likes: Arc<dyn LikesRepo>,
        threads: Arc<dyn ThreadsRepo>,
        fanout: FanoutChannel,
    ) -> Self {
        Self {
            likes,
            threads,
            fanout,
        }
    }

    /// Like the thread if the actor has no like row for it, un-like it
    /// otherwise.
    ///
    /// The presence check and the write are two steps; two concurrent
    /// toggles from the same actor can both see "absent" and insert
    /// twice. Accepted race; no locking added here.
    pub async fn toggle(&self, actor: Actor, thread_id: Uuid) -> Result<LikeOutcome, AppError> {
        if self.threads.find_by_id(thread_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let existing = self.likes.find_for(actor.id, thread_id).await?;
        let liked = match existing {
            Some(row) => {
                self.likes.delete_like(row.id).await?;
                false
            }
            None => {
                self.likes.create_like(actor.id, thread_id).await?;
                true
            }
        };

        let count = self.likes.count_for_thread(thread_id).await?;
        self.fanout.publish(MutationEvent::LikeToggled {
            thread_id,
            count,
            user_id: actor.id,
            liked,
        });

        Ok(LikeOutcome { liked, count })
    }
}
