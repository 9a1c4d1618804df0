//! Shared wire types for the Circle social feed API.
//!
//! Rendered views (threads, replies, users) as the server returns them,
//! the [`MutationEvent`] enum pushed over the live event stream, and the
//! JSON response envelope. Both the server and the client-side store
//! build against these types so the two ends cannot drift apart.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// JSON envelope wrapping every API response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody<T> {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ResponseBody<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ResponseBody<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

/// A thread as rendered for list and detail views: author profile fields
/// joined in, reply/like counts aggregated, and `is_liked` evaluated for
/// the viewing user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ThreadView {
    pub id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub username: Option<String>,
    pub full_name: String,
    pub photo_profile: Option<String>,
    pub reply_count: i64,
    pub like_count: i64,
    pub is_liked: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}

/// A reply as rendered inside a thread's reply list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReplyView {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub username: Option<String>,
    pub full_name: String,
    pub photo_profile: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub updated_by: Uuid,
}

/// A user profile as rendered for people lists, follow lists and the
/// profile page. `is_followed` is evaluated for the viewing user and
/// defaults to `false` where no viewer applies (e.g. event payloads).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserView {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: String,
    pub email: String,
    pub photo_profile: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub is_followed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Aggregate follow counts for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub total_following: i64,
    pub total_followers: i64,
}

/// A mutation that already happened, broadcast to every connected
/// subscriber so clients can patch their local state without re-fetching.
///
/// Each variant carries the minimal payload its dependents need. Events
/// are ephemeral: constructed once after a successful store write,
/// delivered at most once, never persisted or replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum MutationEvent {
    /// A new thread, fully rendered (zero counts, `is_liked: false`).
    ThreadCreated { thread: ThreadView },
    ThreadDeleted { id: Uuid },
    /// The new reply plus the owning thread's updated reply count.
    ReplyCreated {
        reply: ReplyView,
        thread_id: Uuid,
        reply_count: i64,
    },
    ReplyDeleted {
        id: Uuid,
        thread_id: Uuid,
        reply_count: i64,
    },
    /// `liked` is the direction: `true` after a like, `false` after an
    /// un-like. `count` is the thread's new total.
    LikeToggled {
        thread_id: Uuid,
        count: i64,
        user_id: Uuid,
        liked: bool,
    },
    /// `following` is the direction; `user` is the target's profile so
    /// clients can move it between their local sets.
    FollowToggled {
        follower_id: Uuid,
        following_id: Uuid,
        following: bool,
        user: UserView,
    },
    UserUpdated { user: UserView },
}

impl MutationEvent {
    /// The wire name of this event kind, used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationEvent::ThreadCreated { .. } => "ThreadCreated",
            MutationEvent::ThreadDeleted { .. } => "ThreadDeleted",
            MutationEvent::ReplyCreated { .. } => "ReplyCreated",
            MutationEvent::ReplyDeleted { .. } => "ReplyDeleted",
            MutationEvent::LikeToggled { .. } => "LikeToggled",
            MutationEvent::FollowToggled { .. } => "FollowToggled",
            MutationEvent::UserUpdated { .. } => "UserUpdated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(id: Uuid) -> UserView {
        UserView {
            id,
            username: Some("ada".to_string()),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            photo_profile: None,
            bio: None,
            is_followed: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn event_kind_names_match_variants() {
        let event = MutationEvent::LikeToggled {
            thread_id: Uuid::nil(),
            count: 1,
            user_id: Uuid::nil(),
            liked: true,
        };
        assert_eq!(event.kind(), "LikeToggled");

        let event = MutationEvent::UserUpdated {
            user: sample_user(Uuid::nil()),
        };
        assert_eq!(event.kind(), "UserUpdated");
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = MutationEvent::ThreadDeleted { id: Uuid::nil() };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["kind"], "ThreadDeleted");
        assert_eq!(
            json["payload"]["id"],
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn event_roundtrips_through_json() {
        let event = MutationEvent::FollowToggled {
            follower_id: Uuid::nil(),
            following_id: Uuid::nil(),
            following: true,
            user: sample_user(Uuid::nil()),
        };
        let json = serde_json::to_string(&event).expect("serialize event");
        let back: MutationEvent = serde_json::from_str(&json).expect("deserialize event");
        assert_eq!(back, event);
    }

    #[test]
    fn envelope_omits_absent_data() {
        let body = ResponseBody::message_only("Logout successful");
        let json = serde_json::to_value(&body).expect("serialize envelope");
        assert!(json.get("data").is_none());
    }
}
