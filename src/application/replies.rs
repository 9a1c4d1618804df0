//! Reply queries and mutations.

use std::sync::Arc;

use circle_api_types::{MutationEvent, ReplyView};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::read_through::read_through;
use crate::application::repos::{CreateReplyParams, RepliesRepo, SortSpec, ThreadsRepo};
use crate::application::sessions::Actor;
use crate::cache::{CacheInvalidator, CacheStore, keys};
use crate::domain::error::DomainError;
use crate::realtime::FanoutChannel;

#[derive(Debug, Clone)]
pub struct CreateReplyCommand {
    pub content: String,
    pub image: Option<String>,
}

/// What a reply delete leaves for the caller: the stored image to unlink,
/// if any.
#[derive(Debug, Clone, Default)]
pub struct DeletedReply {
    pub image: Option<String>,
}

pub struct ReplyService {
    replies: Arc<dyn RepliesRepo>,
    threads: Arc<dyn ThreadsRepo>,
    cache: Arc<CacheStore>,
    invalidator: CacheInvalidator,
    fanout: FanoutChannel,
}

impl ReplyService {
    pub fn new(
        replies: Arc<dyn RepliesRepo>,
        threads: Arc<dyn ThreadsRepo>,
        cache: Arc<CacheStore>,
        invalidator: CacheInvalidator,
        fanout: FanoutChannel,
    ) -> Self {
        Self {
            replies,
            threads,
            cache,
            invalidator,
            fanout,
        }
    }

    pub async fn list_replies(
        &self,
        thread_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ReplyView>, AppError> {
        let key = keys::replies_page(thread_id, &page, sort.field, sort.order);
        read_through(&self.cache, &key, async || {
            self.replies.list_for_thread(thread_id, page, sort).await
        })
        .await
    }

    pub async fn create_reply(
        &self,
        actor: Actor,
        thread_id: Uuid,
        command: CreateReplyCommand,
    ) -> Result<ReplyView, AppError> {
        if command.content.trim().is_empty() {
            return Err(AppError::validation("reply content must not be empty"));
        }
        if self.threads.find_by_id(thread_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let record = self
            .replies
            .create_reply(CreateReplyParams {
                thread_id,
                content: command.content,
                image: command.image,
                created_by: actor.id,
            })
            .await?;

        let rendered = self
            .replies
            .reply_view(record.id)
            .await?
            .ok_or_else(|| {
                AppError::from(DomainError::invariant("created reply not readable back"))
            })?;
        let reply_count = self.replies.count_for_thread(thread_id).await?;

        // Reply counts are denormalized into thread list and detail
        // views, so those prefixes go stale along with the reply list.
        self.invalidate_for(thread_id);
        self.fanout.publish(MutationEvent::ReplyCreated {
            reply: rendered.clone(),
            thread_id,
            reply_count,
        });

        Ok(rendered)
    }

    pub async fn delete_reply(&self, actor: Actor, id: Uuid) -> Result<DeletedReply, AppError> {
        let record = self
            .replies
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)?;

        if record.created_by != actor.id {
            return Err(DomainError::unauthorized("only the creator may delete this reply").into());
        }

        self.replies.delete_reply(id).await?;
        let reply_count = self.replies.count_for_thread(record.thread_id).await?;

        self.invalidate_for(record.thread_id);
        self.fanout.publish(MutationEvent::ReplyDeleted {
            id,
            thread_id: record.thread_id,
            reply_count,
        });

        Ok(DeletedReply {
            image: record.image,
        })
    }

    fn invalidate_for(&self, thread_id: Uuid) {
        self.invalidator.invalidate_all(&[
            keys::replies_prefix(thread_id),
            keys::thread_prefix(thread_id),
            keys::THREADS_PREFIX.to_string(),
        ]);
    }
}
