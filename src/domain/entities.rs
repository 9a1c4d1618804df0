//! Domain entities mirrored from persistent storage.
//!
//! Every record carries the audit pair (`created_by`/`updated_by`) and
//! timestamps the storage layer maintains.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub photo_profile: Option<String>,
    pub bio: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: Option<Uuid>,
    pub updated_at: OffsetDateTime,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadRecord {
    pub id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyRecord {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}

/// Join row for a like. At most one row exists per (user, thread) pair;
/// the toggle handler enforces this, not the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LikeRecord {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}

/// Join row for a follow edge. At most one row per (follower, following)
/// pair, and follower never equals following.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowingRecord {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}
