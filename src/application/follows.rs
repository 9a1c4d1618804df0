//! Follow toggling and follow lists.

use std::sync::Arc;

use circle_api_types::{FollowCounts, MutationEvent, UserView};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{FollowsRepo, SortSpec, UsersRepo};
use crate::application::sessions::Actor;
use crate::cache::{CacheInvalidator, keys};
use crate::domain::error::DomainError;
use crate::realtime::FanoutChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOutcome {
    pub following: bool,
}

pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
    invalidator: CacheInvalidator,
    fanout: FanoutChannel,
}

impl FollowService {
    pub fn new(
        follows: Arc<dyn FollowsRepo>,
        users: Arc<dyn UsersRepo>,
        invalidator: CacheInvalidator,
        fanout: FanoutChannel,
    ) -> Self {
        Self {
            follows,
            users,
            invalidator,
            fanout,
        }
    }

    /// Follow `target` if no edge exists, unfollow otherwise.
    ///
    /// Self-follow is a domain error rejected before any write. The
    /// check-then-act on the existing edge carries the same accepted
    /// duplicate race as the like toggle.
    pub async fn toggle(&self, actor: Actor, target: Uuid) -> Result<FollowOutcome, AppError> {
        if actor.id == target {
            return Err(DomainError::unauthorized("you cannot follow yourself").into());
        }

        let mut user = self
            .users
            .user_view(target, actor.id)
            .await?
            .ok_or(AppError::NotFound)?;

        let existing = self.follows.find_edge(actor.id, target).await?;
        let following = match existing {
            Some(edge) => {
                self.follows.delete_edge(edge.id).await?;
                false
            }
            None => {
                self.follows.create_edge(actor.id, target).await?;
                true
            }
        };
        user.is_followed = following;

        // People lists annotate is_followed, and the actor's feed
        // membership just changed.
        self.invalidator.invalidate_all(&[
            keys::USERS_PREFIX.to_string(),
            keys::feed_prefix(actor.id),
        ]);
        self.fanout.publish(MutationEvent::FollowToggled {
            follower_id: actor.id,
            following_id: target,
            following,
            user,
        });

        Ok(FollowOutcome { following })
    }

    pub async fn counts(&self, user_id: Uuid) -> Result<FollowCounts, AppError> {
        self.follows.counts_for(user_id).await.map_err(Into::into)
    }

    pub async fn list_following(
        &self,
        actor: Actor,
        user_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, AppError> {
        self.follows
            .list_following(user_id, actor.id, page, sort)
            .await
            .map_err(Into::into)
    }

    pub async fn list_followers(
        &self,
        actor: Actor,
        user_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, AppError> {
        self.follows
            .list_followers(user_id, actor.id, page, sort)
            .await
            .map_err(Into::into)
    }

    pub async fn list_suggested(
        &self,
        actor: Actor,
        user_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, AppError> {
        self.follows
            .list_suggested(user_id, actor.id, page, sort)
            .await
            .map_err(Into::into)
    }
}
