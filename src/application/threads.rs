//! Thread queries and mutations.
//!
//! Mutations follow the shared protocol: the store write commits first,
//! then every cache prefix whose contents could now be stale is evicted,
//! then the mutation event is published. The ordering matters — a client
//! that re-fetches the moment it receives the event must hit an
//! already-invalidated cache and re-read from the store.

use std::sync::Arc;

use circle_api_types::{MutationEvent, ThreadView};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::read_through::read_through;
use crate::application::repos::{
    CascadeDeletedImages, CreateThreadParams, SortSpec, ThreadsRepo,
};
use crate::application::sessions::Actor;
use crate::cache::{CacheInvalidator, CacheStore, keys};
use crate::domain::error::DomainError;
use crate::realtime::FanoutChannel;

#[derive(Debug, Clone)]
pub struct CreateThreadCommand {
    pub content: String,
    pub image: Option<String>,
}

pub struct ThreadService {
    threads: Arc<dyn ThreadsRepo>,
    cache: Arc<CacheStore>,
    invalidator: CacheInvalidator,
    fanout: FanoutChannel,
}

impl ThreadService {
    pub fn new(
        threads: Arc<dyn ThreadsRepo>,
        cache: Arc<CacheStore>,
        invalidator: CacheInvalidator,
        fanout: FanoutChannel,
    ) -> Self {
        Self {
            threads,
            cache,
            invalidator,
            fanout,
        }
    }

    /// The actor's followed feed, served read-through from the cache.
    pub async fn list_feed(
        &self,
        actor: Actor,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ThreadView>, AppError> {
        let key = keys::feed_page(actor.id, &page, sort.field, sort.order);
        read_through(&self.cache, &key, async || {
            self.threads.feed(actor.id, page, sort).await
        })
        .await
    }

    pub async fn get_thread(&self, actor: Actor, id: Uuid) -> Result<ThreadView, AppError> {
        let key = keys::thread_detail(id, actor.id);
        let found: Option<ThreadView> = read_through(&self.cache, &key, async || {
            self.threads.thread_view(id, actor.id).await
        })
        .await?;
        found.ok_or(AppError::NotFound)
    }

    pub async fn create_thread(
        &self,
        actor: Actor,
        command: CreateThreadCommand,
    ) -> Result<ThreadView, AppError> {
        if command.content.trim().is_empty() {
            return Err(AppError::validation("thread content must not be empty"));
        }

        let record = self
            .threads
            .create_thread(CreateThreadParams {
                content: command.content,
                image: command.image,
                created_by: actor.id,
            })
            .await?;

        let rendered = self
            .threads
            .thread_view(record.id, actor.id)
            .await?
            .ok_or_else(|| {
                AppError::from(DomainError::invariant("created thread not readable back"))
            })?;

        // Every viewer's feed pages may now show a new first row.
        self.invalidator.invalidate(keys::THREADS_PREFIX);
        self.fanout.publish(MutationEvent::ThreadCreated {
            thread: rendered.clone(),
        });

        Ok(rendered)
    }

    /// Delete a thread with its replies and likes. Only the creator may;
    /// the cascade is one transaction. Returns the stored image paths
    /// the caller should unlink now that the rows are gone.
    pub async fn delete_thread(
        &self,
        actor: Actor,
        id: Uuid,
    ) -> Result<CascadeDeletedImages, AppError> {
        let record = self
            .threads
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)?;

        if record.created_by != actor.id {
            return Err(DomainError::unauthorized("only the creator may delete this thread").into());
        }

        let images = self.threads.delete_cascade(id).await?;

        self.invalidator.invalidate_all(&[
            keys::THREADS_PREFIX.to_string(),
            keys::thread_prefix(id),
            keys::replies_prefix(id),
        ]);
        self.fanout.publish(MutationEvent::ThreadDeleted { id });

        Ok(images)
    }
}
