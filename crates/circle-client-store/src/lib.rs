//! Client-side read-through store for the Circle feed.
//!
//! Holds the last-fetched page of each resource (threads, a thread
//! detail with its replies, people lists) and patches itself from
//! [`MutationEvent`]s instead of re-fetching. Patching is idempotent:
//! list insertion is keyed on resource id with replace-or-insert
//! semantics, and count fields are replaced, never incremented, so a
//! duplicate event leaves the store unchanged.
//!
//! Some events cannot be patched locally (aggregate counts after a
//! follow toggle, lists that denormalize profile fields after a user
//! update). For those the store raises a refresh flag that the consumer
//! drains with the `take_*` methods and services with a cold fetch.

use circle_api_types::{MutationEvent, ReplyView, ThreadView, UserView};
use uuid::Uuid;

/// Local state for one connected client, keyed to its logged-in identity.
#[derive(Debug, Clone)]
pub struct ClientStore {
    identity: Uuid,
    threads: Vec<ThreadView>,
    thread_detail: Option<ThreadView>,
    replies: Vec<ReplyView>,
    users: Vec<UserView>,
    suggested: Vec<UserView>,
    following: Vec<UserView>,
    profile: Option<UserView>,
    detail_redirect: bool,
    counts_stale: bool,
    user_lists_stale: bool,
}

impl ClientStore {
    pub fn new(identity: Uuid) -> Self {
        Self {
            identity,
            threads: Vec::new(),
            thread_detail: None,
            replies: Vec::new(),
            users: Vec::new(),
            suggested: Vec::new(),
            following: Vec::new(),
            profile: None,
            detail_redirect: false,
            counts_stale: false,
            user_lists_stale: false,
        }
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    // ========================================================================
    // Hydration from cold fetches
    // ========================================================================

    pub fn set_threads(&mut self, page: Vec<ThreadView>) {
        self.threads = page;
    }

    pub fn set_thread_detail(&mut self, thread: ThreadView, replies: Vec<ReplyView>) {
        self.thread_detail = Some(thread);
        self.replies = replies;
        self.detail_redirect = false;
    }

    pub fn set_users(&mut self, page: Vec<UserView>) {
        self.users = page;
    }

    pub fn set_suggested(&mut self, page: Vec<UserView>) {
        self.suggested = page;
    }

    pub fn set_following(&mut self, page: Vec<UserView>) {
        self.following = page;
    }

    pub fn set_profile(&mut self, user: UserView) {
        self.profile = Some(user);
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn threads(&self) -> &[ThreadView] {
        &self.threads
    }

    pub fn thread_detail(&self) -> Option<&ThreadView> {
        self.thread_detail.as_ref()
    }

    pub fn replies(&self) -> &[ReplyView] {
        &self.replies
    }

    pub fn users(&self) -> &[UserView] {
        &self.users
    }

    pub fn suggested(&self) -> &[UserView] {
        &self.suggested
    }

    pub fn following(&self) -> &[UserView] {
        &self.following
    }

    pub fn profile(&self) -> Option<&UserView> {
        self.profile.as_ref()
    }

    /// True once a `ThreadDeleted` removed the thread the detail view was
    /// showing; the component must navigate away. Reading clears the flag.
    pub fn take_detail_redirect(&mut self) -> bool {
        std::mem::take(&mut self.detail_redirect)
    }

    /// True once aggregate follow counts need a cold re-fetch.
    pub fn take_counts_stale(&mut self) -> bool {
        std::mem::take(&mut self.counts_stale)
    }

    /// True once lists denormalizing profile fields need a cold re-fetch.
    pub fn take_user_lists_stale(&mut self) -> bool {
        std::mem::take(&mut self.user_lists_stale)
    }

    // ========================================================================
    // Event application
    // ========================================================================

    /// Apply one broadcast mutation event to the local state.
    ///
    /// Events carry no addressing: every client receives every event and
    /// discards what does not touch its own views.
    pub fn apply(&mut self, event: &MutationEvent) {
        match event {
            MutationEvent::ThreadCreated { thread } => {
                upsert_front(&mut self.threads, thread.clone(), |t| t.id);
            }
            MutationEvent::ThreadDeleted { id } => {
                self.threads.retain(|t| t.id != *id);
                if self.thread_detail.as_ref().is_some_and(|t| t.id == *id) {
                    self.thread_detail = None;
                    self.replies.clear();
                    self.detail_redirect = true;
                }
            }
            MutationEvent::ReplyCreated {
                reply,
                thread_id,
                reply_count,
            } => {
                self.set_reply_count(*thread_id, *reply_count);
                if self
                    .thread_detail
                    .as_ref()
                    .is_some_and(|t| t.id == *thread_id)
                {
                    upsert_front(&mut self.replies, reply.clone(), |r| r.id);
                }
            }
            MutationEvent::ReplyDeleted {
                id,
                thread_id,
                reply_count,
            } => {
                self.set_reply_count(*thread_id, *reply_count);
                self.replies.retain(|r| r.id != *id);
            }
            MutationEvent::LikeToggled {
                thread_id,
                count,
                user_id,
                liked,
            } => {
                let own = *user_id == self.identity;
                for thread in self.threads.iter_mut().filter(|t| t.id == *thread_id) {
                    thread.like_count = *count;
                    if own {
                        thread.is_liked = *liked;
                    }
                }
                if let Some(detail) = self
                    .thread_detail
                    .as_mut()
                    .filter(|t| t.id == *thread_id)
                {
                    detail.like_count = *count;
                    if own {
                        detail.is_liked = *liked;
                    }
                }
            }
            MutationEvent::FollowToggled {
                follower_id,
                following_id,
                following,
                user,
            } => {
                if *follower_id == self.identity {
                    if *following {
                        self.suggested.retain(|u| u.id != *following_id);
                        upsert_front(&mut self.following, user.clone(), |u| u.id);
                    } else {
                        self.following.retain(|u| u.id != *following_id);
                        upsert_front(&mut self.suggested, user.clone(), |u| u.id);
                    }
                    for entry in self.users.iter_mut().filter(|u| u.id == *following_id) {
                        entry.is_followed = *following;
                    }
                }
                if *follower_id == self.identity || *following_id == self.identity {
                    self.counts_stale = true;
                }
            }
            MutationEvent::UserUpdated { user } => {
                self.patch_profile_fields(user);
                self.user_lists_stale = true;
            }
        }
    }

    fn set_reply_count(&mut self, thread_id: Uuid, count: i64) {
        for thread in self.threads.iter_mut().filter(|t| t.id == thread_id) {
            thread.reply_count = count;
        }
        if let Some(detail) = self.thread_detail.as_mut().filter(|t| t.id == thread_id) {
            detail.reply_count = count;
        }
    }

    /// Replace cached profile fields wherever the updated id appears,
    /// preserving locally-evaluated annotations (`is_followed`).
    fn patch_profile_fields(&mut self, user: &UserView) {
        let lists = [
            &mut self.users,
            &mut self.suggested,
            &mut self.following,
        ];
        for list in lists {
            for entry in list.iter_mut().filter(|u| u.id == user.id) {
                let is_followed = entry.is_followed;
                *entry = user.clone();
                entry.is_followed = is_followed;
            }
        }
        if let Some(profile) = self.profile.as_mut().filter(|p| p.id == user.id) {
            let is_followed = profile.is_followed;
            *profile = user.clone();
            profile.is_followed = is_followed;
        }
    }
}

/// Insert `item` at the front of `list`, or replace it in place when an
/// entry with the same id already exists. The in-place replace is what
/// makes duplicate delivery a no-op instead of a duplicate row.
fn upsert_front<T, K: PartialEq>(list: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let id = key(&item);
    match list.iter_mut().find(|existing| key(existing) == id) {
        Some(existing) => *existing = item,
        None => list.insert(0, item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn thread(id: Uuid, author: Uuid, content: &str) -> ThreadView {
        ThreadView {
            id,
            content: content.to_string(),
            image: None,
            username: Some("ada".to_string()),
            full_name: "Ada Lovelace".to_string(),
            photo_profile: None,
            reply_count: 0,
            like_count: 0,
            is_liked: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            created_by: author,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            updated_by: author,
        }
    }

    fn reply(id: Uuid, thread_id: Uuid, author: Uuid) -> ReplyView {
        ReplyView {
            id,
            thread_id,
            content: "hi".to_string(),
            image: None,
            username: Some("grace".to_string()),
            full_name: "Grace Hopper".to_string(),
            photo_profile: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            created_by: author,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            updated_by: author,
        }
    }

    fn user(id: Uuid, name: &str) -> UserView {
        UserView {
            id,
            username: Some(name.to_string()),
            full_name: name.to_string(),
            email: format!("{name}@example.com"),
            photo_profile: None,
            bio: None,
            is_followed: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn thread_created_prepends() {
        let me = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_threads(vec![thread(Uuid::new_v4(), me, "old")]);

        let fresh = thread(Uuid::new_v4(), me, "hello");
        store.apply(&MutationEvent::ThreadCreated {
            thread: fresh.clone(),
        });

        assert_eq!(store.threads().len(), 2);
        assert_eq!(store.threads()[0], fresh);
    }

    #[test]
    fn thread_created_twice_does_not_duplicate() {
        let me = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        let fresh = thread(Uuid::new_v4(), me, "hello");

        let event = MutationEvent::ThreadCreated {
            thread: fresh.clone(),
        };
        store.apply(&event);
        store.apply(&event);

        assert_eq!(store.threads().len(), 1);
    }

    #[test]
    fn thread_deleted_clears_matching_detail_and_redirects() {
        let me = Uuid::new_v4();
        let id = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_threads(vec![thread(id, me, "doomed")]);
        store.set_thread_detail(thread(id, me, "doomed"), vec![reply(Uuid::new_v4(), id, me)]);

        store.apply(&MutationEvent::ThreadDeleted { id });

        assert!(store.threads().is_empty());
        assert!(store.thread_detail().is_none());
        assert!(store.replies().is_empty());
        assert!(store.take_detail_redirect());
        // Flag is drained by the read.
        assert!(!store.take_detail_redirect());
    }

    #[test]
    fn thread_deleted_leaves_unrelated_detail_alone() {
        let me = Uuid::new_v4();
        let shown = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_thread_detail(thread(shown, me, "kept"), vec![]);

        store.apply(&MutationEvent::ThreadDeleted { id: Uuid::new_v4() });

        assert!(store.thread_detail().is_some());
        assert!(!store.take_detail_redirect());
    }

    #[test]
    fn reply_created_is_idempotent() {
        let me = Uuid::new_v4();
        let thread_id = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_threads(vec![thread(thread_id, me, "t")]);
        store.set_thread_detail(thread(thread_id, me, "t"), vec![]);

        let event = MutationEvent::ReplyCreated {
            reply: reply(Uuid::new_v4(), thread_id, me),
            thread_id,
            reply_count: 1,
        };
        store.apply(&event);
        let once = store.clone();
        store.apply(&event);

        assert_eq!(store.replies().len(), once.replies().len());
        assert_eq!(store.threads()[0].reply_count, 1);
        assert_eq!(store.thread_detail().unwrap().reply_count, 1);
    }

    #[test]
    fn reply_deleted_removes_row_and_replaces_count() {
        let me = Uuid::new_v4();
        let thread_id = Uuid::new_v4();
        let reply_id = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        let mut shown = thread(thread_id, me, "t");
        shown.reply_count = 2;
        store.set_thread_detail(shown, vec![reply(reply_id, thread_id, me)]);

        store.apply(&MutationEvent::ReplyDeleted {
            id: reply_id,
            thread_id,
            reply_count: 1,
        });

        assert!(store.replies().is_empty());
        assert_eq!(store.thread_detail().unwrap().reply_count, 1);
    }

    #[test]
    fn like_toggled_flips_is_liked_only_for_acting_identity() {
        let me = Uuid::new_v4();
        let someone = Uuid::new_v4();
        let thread_id = Uuid::new_v4();

        let mut mine = ClientStore::new(me);
        let mut theirs = ClientStore::new(Uuid::new_v4());
        mine.set_threads(vec![thread(thread_id, someone, "t")]);
        theirs.set_threads(vec![thread(thread_id, someone, "t")]);

        let event = MutationEvent::LikeToggled {
            thread_id,
            count: 1,
            user_id: me,
            liked: true,
        };
        mine.apply(&event);
        theirs.apply(&event);

        assert_eq!(mine.threads()[0].like_count, 1);
        assert!(mine.threads()[0].is_liked);
        assert_eq!(theirs.threads()[0].like_count, 1);
        assert!(!theirs.threads()[0].is_liked);
    }

    #[test]
    fn follow_toggled_moves_target_between_sets() {
        let me = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_suggested(vec![user(target, "grace")]);

        store.apply(&MutationEvent::FollowToggled {
            follower_id: me,
            following_id: target,
            following: true,
            user: user(target, "grace"),
        });

        assert!(store.suggested().is_empty());
        assert_eq!(store.following().len(), 1);
        assert!(store.take_counts_stale());

        store.apply(&MutationEvent::FollowToggled {
            follower_id: me,
            following_id: target,
            following: false,
            user: user(target, "grace"),
        });

        assert!(store.following().is_empty());
        assert_eq!(store.suggested().len(), 1);
    }

    #[test]
    fn follow_toggled_by_someone_else_leaves_sets_alone() {
        let me = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        store.set_suggested(vec![user(target, "grace")]);

        store.apply(&MutationEvent::FollowToggled {
            follower_id: Uuid::new_v4(),
            following_id: target,
            following: true,
            user: user(target, "grace"),
        });

        assert_eq!(store.suggested().len(), 1);
        assert!(store.following().is_empty());
        assert!(!store.take_counts_stale());
    }

    #[test]
    fn user_updated_patches_fields_and_flags_lists_stale() {
        let me = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut store = ClientStore::new(me);
        let mut listed = user(target, "grace");
        listed.is_followed = true;
        store.set_users(vec![listed]);

        let mut updated = user(target, "grace");
        updated.full_name = "Rear Admiral Grace Hopper".to_string();
        store.apply(&MutationEvent::UserUpdated { user: updated });

        assert_eq!(store.users()[0].full_name, "Rear Admiral Grace Hopper");
        // Viewer-local annotation survives the replace.
        assert!(store.users()[0].is_followed);
        assert!(store.take_user_lists_stale());
    }
}
