//! Repository traits describing persistence adapters.
//!
//! Services depend on these seams, never on the Postgres adapter
//! directly, so tests can run the full mutation protocol against
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use circle_api_types::{FollowCounts, ReplyView, ThreadView, UserView};

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{FollowingRecord, LikeRecord, ReplyRecord, ThreadRecord, UserRecord};
use crate::domain::types::{SortField, SortOrder};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Sort parameters resolved from the allow-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: String,
    pub bio: Option<String>,
    /// `Some(None)` clears the photo, `Some(Some(path))` replaces it,
    /// `None` leaves it untouched.
    pub photo_profile: Option<Option<String>>,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct UserQueryFilter {
    pub search: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Insert the user and stamp its self-referential `created_by` in
    /// one transaction.
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    /// Lookup by email or username, for login.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn update_profile(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), RepoError>;

    /// People list annotated with `is_followed` for `viewer`.
    async fn list_users(
        &self,
        viewer: Uuid,
        filter: &UserQueryFilter,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError>;

    /// A single profile annotated with `is_followed` for `viewer`.
    async fn user_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<UserView>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateThreadParams {
    pub content: String,
    pub image: Option<String>,
    pub created_by: Uuid,
}

/// Paths of stored images released by a cascading thread delete; the
/// caller removes the files after the transaction commits.
#[derive(Debug, Clone, Default)]
pub struct CascadeDeletedImages {
    pub images: Vec<String>,
}

#[async_trait]
pub trait ThreadsRepo: Send + Sync {
    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ThreadRecord>, RepoError>;

    /// Delete the thread with its likes and replies as one all-or-nothing
    /// transaction. A failure leaves the store exactly as before.
    async fn delete_cascade(&self, id: Uuid) -> Result<CascadeDeletedImages, RepoError>;

    /// The viewer's followed feed: own threads plus followed authors,
    /// with counts and `is_liked` evaluated for `viewer`.
    async fn feed(
        &self,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ThreadView>, RepoError>;

    async fn thread_view(&self, id: Uuid, viewer: Uuid)
    -> Result<Option<ThreadView>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateReplyParams {
    pub thread_id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub created_by: Uuid,
}

#[async_trait]
pub trait RepliesRepo: Send + Sync {
    async fn create_reply(&self, params: CreateReplyParams) -> Result<ReplyRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReplyRecord>, RepoError>;

    async fn delete_reply(&self, id: Uuid) -> Result<(), RepoError>;

    async fn count_for_thread(&self, thread_id: Uuid) -> Result<i64, RepoError>;

    async fn list_for_thread(
        &self,
        thread_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ReplyView>, RepoError>;

    async fn reply_view(&self, id: Uuid) -> Result<Option<ReplyView>, RepoError>;
}

#[async_trait]
pub trait LikesRepo: Send + Sync {
    async fn find_for(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
    ) -> Result<Option<LikeRecord>, RepoError>;

    async fn create_like(&self, user_id: Uuid, thread_id: Uuid) -> Result<LikeRecord, RepoError>;

    async fn delete_like(&self, id: Uuid) -> Result<(), RepoError>;

    async fn count_for_thread(&self, thread_id: Uuid) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn find_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<Option<FollowingRecord>, RepoError>;

    async fn create_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<FollowingRecord, RepoError>;

    async fn delete_edge(&self, id: Uuid) -> Result<(), RepoError>;

    async fn counts_for(&self, user_id: Uuid) -> Result<FollowCounts, RepoError>;

    /// Users `user_id` follows, annotated for `viewer`.
    async fn list_following(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError>;

    /// Users following `user_id`, annotated for `viewer`.
    async fn list_followers(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError>;

    /// Users `user_id` does not follow yet (excluding itself),
    /// annotated for `viewer`.
    async fn list_suggested(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError>;
}
