//! Mutation-protocol properties, run against in-memory repositories.
//!
//! Each test drives a service the way a handler would and asserts the
//! three-step contract: the store change persisted, the declared cache
//! prefixes are empty, and exactly one event of the matching kind was
//! published. The end-to-end scenarios feed that event into the
//! client-side store to check clients patch without re-fetching.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use circle::application::follows::FollowService;
use circle::application::likes::LikeService;
use circle::application::pagination::{Page, PageRequest};
use circle::application::replies::{CreateReplyCommand, ReplyService};
use circle::application::repos::{
    CascadeDeletedImages, CreateReplyParams, CreateThreadParams, CreateUserParams, FollowsRepo,
    LikesRepo, RepliesRepo, RepoError, SortSpec, ThreadsRepo, UpdateUserParams, UserQueryFilter,
    UsersRepo,
};
use circle::application::sessions::Actor;
use circle::application::threads::{CreateThreadCommand, ThreadService};
use circle::cache::{CacheInvalidator, CacheStore, keys};
use circle::domain::entities::{
    FollowingRecord, LikeRecord, ReplyRecord, ThreadRecord, UserRecord,
};
use circle::realtime::FanoutChannel;

use circle_api_types::{FollowCounts, MutationEvent, ReplyView, ThreadView, UserView};
use circle_client_store::ClientStore;

// ============================================================================
// In-memory repositories
// ============================================================================

#[derive(Default)]
struct InMemoryRepos {
    users: Mutex<Vec<UserRecord>>,
    threads: Mutex<Vec<ThreadRecord>>,
    replies: Mutex<Vec<ReplyRecord>>,
    likes: Mutex<Vec<LikeRecord>>,
    follows: Mutex<Vec<FollowingRecord>>,
}

impl InMemoryRepos {
    fn seed_user(&self, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        self.users.lock().unwrap().push(UserRecord {
            id,
            username: Some(full_name.to_lowercase().replace(' ', "-")),
            full_name: full_name.to_string(),
            email: format!("{}@example.com", full_name.to_lowercase().replace(' ', ".")),
            password_hash: "hash".to_string(),
            photo_profile: None,
            bio: None,
            created_at: now,
            created_by: Some(id),
            updated_at: now,
            updated_by: Some(id),
        });
        id
    }

    fn user_view_of(&self, id: Uuid, viewer: Uuid) -> Option<UserView> {
        let users = self.users.lock().unwrap();
        let user = users.iter().find(|u| u.id == id)?;
        let is_followed = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .any(|f| f.follower_id == viewer && f.following_id == id);
        Some(UserView {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            photo_profile: user.photo_profile.clone(),
            bio: user.bio.clone(),
            is_followed,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    fn thread_view_of(&self, id: Uuid, viewer: Uuid) -> Result<Option<ThreadView>, RepoError> {
        let threads = self.threads.lock().unwrap();
        let Some(thread) = threads.iter().find(|t| t.id == id) else {
            return Ok(None);
        };
        let users = self.users.lock().unwrap();
        let author = users
            .iter()
            .find(|u| u.id == thread.created_by)
            .ok_or_else(|| RepoError::Integrity {
                message: "thread author missing".to_string(),
            })?;
        let likes = self.likes.lock().unwrap();
        let replies = self.replies.lock().unwrap();

        Ok(Some(ThreadView {
            id: thread.id,
            content: thread.content.clone(),
            image: thread.image.clone(),
            username: author.username.clone(),
            full_name: author.full_name.clone(),
            photo_profile: author.photo_profile.clone(),
            reply_count: replies.iter().filter(|r| r.thread_id == id).count() as i64,
            like_count: likes.iter().filter(|l| l.thread_id == id).count() as i64,
            is_liked: likes
                .iter()
                .any(|l| l.thread_id == id && l.user_id == viewer),
            created_at: thread.created_at,
            created_by: thread.created_by,
            updated_at: thread.updated_at,
            updated_by: thread.updated_by,
        }))
    }

    fn reply_view_of(&self, id: Uuid) -> Result<Option<ReplyView>, RepoError> {
        let replies = self.replies.lock().unwrap();
        let Some(reply) = replies.iter().find(|r| r.id == id) else {
            return Ok(None);
        };
        let users = self.users.lock().unwrap();
        let author = users
            .iter()
            .find(|u| u.id == reply.created_by)
            .ok_or_else(|| RepoError::Integrity {
                message: "reply author missing".to_string(),
            })?;

        Ok(Some(ReplyView {
            id: reply.id,
            thread_id: reply.thread_id,
            content: reply.content.clone(),
            image: reply.image.clone(),
            username: author.username.clone(),
            full_name: author.full_name.clone(),
            photo_profile: author.photo_profile.clone(),
            created_at: reply.created_at,
            created_by: reply.created_by,
            updated_at: reply.updated_at,
            updated_by: reply.updated_by,
        }))
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id,
            username: None,
            full_name: params.full_name,
            email: params.email,
            password_hash: params.password_hash,
            photo_profile: None,
            bio: None,
            created_at: now,
            created_by: Some(id),
            updated_at: now,
            updated_by: Some(id),
        };
        self.users.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == identifier || u.username.as_deref() == Some(identifier))
            .cloned())
    }

    async fn update_profile(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.username = params.username;
        user.full_name = params.full_name;
        user.bio = params.bio;
        if let Some(photo) = params.photo_profile {
            user.photo_profile = photo;
        }
        user.updated_by = Some(params.updated_by);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn list_users(
        &self,
        viewer: Uuid,
        filter: &UserQueryFilter,
        page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let ids: Vec<Uuid> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| match &filter.search {
                Some(needle) => u
                    .full_name
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                None => true,
            })
            .map(|u| u.id)
            .collect();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .filter_map(|id| self.user_view_of(id, viewer))
            .collect();
        Ok(Page::new(items, total))
    }

    async fn user_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<UserView>, RepoError> {
        Ok(self.user_view_of(id, viewer))
    }
}

#[async_trait]
impl ThreadsRepo for InMemoryRepos {
    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = ThreadRecord {
            id: Uuid::new_v4(),
            content: params.content,
            image: params.image,
            created_at: now,
            created_by: params.created_by,
            updated_at: now,
            updated_by: params.created_by,
        };
        self.threads.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ThreadRecord>, RepoError> {
        Ok(self
            .threads
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<CascadeDeletedImages, RepoError> {
        let mut threads = self.threads.lock().unwrap();
        let position = threads
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepoError::NotFound)?;
        let thread = threads.remove(position);

        let mut images = Vec::new();
        let mut replies = self.replies.lock().unwrap();
        replies.retain(|r| {
            if r.thread_id == id {
                if let Some(image) = &r.image {
                    images.push(image.clone());
                }
                false
            } else {
                true
            }
        });
        self.likes.lock().unwrap().retain(|l| l.thread_id != id);

        if let Some(image) = thread.image {
            images.push(image);
        }
        Ok(CascadeDeletedImages { images })
    }

    async fn feed(
        &self,
        viewer: Uuid,
        page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<ThreadView>, RepoError> {
        let ids: Vec<Uuid> = {
            let follows = self.follows.lock().unwrap();
            self.threads
                .lock()
                .unwrap()
                .iter()
                .filter(|t| {
                    t.created_by == viewer
                        || follows
                            .iter()
                            .any(|f| f.follower_id == viewer && f.following_id == t.created_by)
                })
                .map(|t| t.id)
                .collect()
        };
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|id| self.thread_view_of(id, viewer))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Page::new(items, total))
    }

    async fn thread_view(
        &self,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<Option<ThreadView>, RepoError> {
        self.thread_view_of(id, viewer)
    }
}

#[async_trait]
impl RepliesRepo for InMemoryRepos {
    async fn create_reply(&self, params: CreateReplyParams) -> Result<ReplyRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = ReplyRecord {
            id: Uuid::new_v4(),
            thread_id: params.thread_id,
            user_id: params.created_by,
            content: params.content,
            image: params.image,
            created_at: now,
            created_by: params.created_by,
            updated_at: now,
            updated_by: params.created_by,
        };
        self.replies.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReplyRecord>, RepoError> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn delete_reply(&self, id: Uuid) -> Result<(), RepoError> {
        let mut replies = self.replies.lock().unwrap();
        let position = replies
            .iter()
            .position(|r| r.id == id)
            .ok_or(RepoError::NotFound)?;
        replies.remove(position);
        Ok(())
    }

    async fn count_for_thread(&self, thread_id: Uuid) -> Result<i64, RepoError> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.thread_id == thread_id)
            .count() as i64)
    }

    async fn list_for_thread(
        &self,
        thread_id: Uuid,
        page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<ReplyView>, RepoError> {
        let ids: Vec<Uuid> = self
            .replies
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.thread_id == thread_id)
            .map(|r| r.id)
            .collect();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|id| self.reply_view_of(id))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Page::new(items, total))
    }

    async fn reply_view(&self, id: Uuid) -> Result<Option<ReplyView>, RepoError> {
        self.reply_view_of(id)
    }
}

#[async_trait]
impl LikesRepo for InMemoryRepos {
    async fn find_for(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
    ) -> Result<Option<LikeRecord>, RepoError> {
        Ok(self
            .likes
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.user_id == user_id && l.thread_id == thread_id)
            .cloned())
    }

    async fn create_like(&self, user_id: Uuid, thread_id: Uuid) -> Result<LikeRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = LikeRecord {
            id: Uuid::new_v4(),
            thread_id,
            user_id,
            created_at: now,
            created_by: user_id,
            updated_at: now,
            updated_by: user_id,
        };
        self.likes.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete_like(&self, id: Uuid) -> Result<(), RepoError> {
        let mut likes = self.likes.lock().unwrap();
        let position = likes
            .iter()
            .position(|l| l.id == id)
            .ok_or(RepoError::NotFound)?;
        likes.remove(position);
        Ok(())
    }

    async fn count_for_thread(&self, thread_id: Uuid) -> Result<i64, RepoError> {
        Ok(self
            .likes
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.thread_id == thread_id)
            .count() as i64)
    }
}

#[async_trait]
impl FollowsRepo for InMemoryRepos {
    async fn find_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<Option<FollowingRecord>, RepoError> {
        Ok(self
            .follows
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
            .cloned())
    }

    async fn create_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<FollowingRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = FollowingRecord {
            id: Uuid::new_v4(),
            follower_id,
            following_id,
            created_at: now,
            created_by: follower_id,
            updated_at: now,
            updated_by: follower_id,
        };
        self.follows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete_edge(&self, id: Uuid) -> Result<(), RepoError> {
        let mut follows = self.follows.lock().unwrap();
        let position = follows
            .iter()
            .position(|f| f.id == id)
            .ok_or(RepoError::NotFound)?;
        follows.remove(position);
        Ok(())
    }

    async fn counts_for(&self, user_id: Uuid) -> Result<FollowCounts, RepoError> {
        let follows = self.follows.lock().unwrap();
        Ok(FollowCounts {
            total_following: follows.iter().filter(|f| f.follower_id == user_id).count() as i64,
            total_followers: follows.iter().filter(|f| f.following_id == user_id).count() as i64,
        })
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        _page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let ids: Vec<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.following_id)
            .collect();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .filter_map(|id| self.user_view_of(id, viewer))
            .collect();
        Ok(Page::new(items, total))
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        _page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let ids: Vec<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.following_id == user_id)
            .map(|f| f.follower_id)
            .collect();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .filter_map(|id| self.user_view_of(id, viewer))
            .collect();
        Ok(Page::new(items, total))
    }

    async fn list_suggested(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        _page: PageRequest,
        _sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let followed: Vec<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.following_id)
            .collect();
        let ids: Vec<Uuid> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.id != user_id && !followed.contains(&u.id))
            .map(|u| u.id)
            .collect();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .filter_map(|id| self.user_view_of(id, viewer))
            .collect();
        Ok(Page::new(items, total))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    repos: Arc<InMemoryRepos>,
    cache: Arc<CacheStore>,
    fanout: FanoutChannel,
    threads: ThreadService,
    replies: ReplyService,
    likes: LikeService,
    follows: FollowService,
}

fn harness() -> Harness {
    let repos = Arc::new(InMemoryRepos::default());
    let cache = Arc::new(CacheStore::new(Duration::from_secs(300)));
    let invalidator = CacheInvalidator::new(cache.clone(), 50);
    let fanout = FanoutChannel::default();

    let threads = ThreadService::new(
        repos.clone(),
        cache.clone(),
        invalidator.clone(),
        fanout.clone(),
    );
    let replies = ReplyService::new(
        repos.clone(),
        repos.clone(),
        cache.clone(),
        invalidator.clone(),
        fanout.clone(),
    );
    let likes = LikeService::new(repos.clone(), repos.clone(), fanout.clone());
    let follows = FollowService::new(repos.clone(), repos.clone(), invalidator, fanout.clone());

    Harness {
        repos,
        cache,
        fanout,
        threads,
        replies,
        likes,
        follows,
    }
}

fn assert_single_event(
    rx: &mut tokio::sync::broadcast::Receiver<MutationEvent>,
) -> MutationEvent {
    let event = rx.try_recv().expect("exactly one event published");
    assert!(rx.try_recv().is_err(), "no further events expected");
    event
}

// ============================================================================
// End-to-end mutation scenarios
// ============================================================================

#[tokio::test]
async fn create_thread_persists_evicts_and_fans_out() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let viewer = h.repos.seed_user("Grace Hopper");

    // Warm feed pages for two different viewers.
    h.cache.put(
        format!("{}{}:p1:l10:screated_at:desc", keys::THREADS_PREFIX, author),
        Bytes::from("[]"),
    );
    h.cache.put(
        format!("{}{}:p1:l10:screated_at:desc", keys::THREADS_PREFIX, viewer),
        Bytes::from("[]"),
    );

    let mut rx = h.fanout.subscribe();
    let rendered = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "hello".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");

    // Persisted, attributed to the actor.
    let stored = h.repos.threads.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].created_by, author);
    drop(stored);

    // Every feed page is gone, not just the author's.
    assert!(h.cache.scan(keys::THREADS_PREFIX, None, 100).keys.is_empty());

    // Exactly one event, carrying the fully rendered thread.
    let event = assert_single_event(&mut rx);
    let MutationEvent::ThreadCreated { thread } = &event else {
        panic!("expected ThreadCreated, got {}", event.kind());
    };
    assert_eq!(thread.content, "hello");
    assert_eq!(thread.reply_count, 0);
    assert_eq!(thread.like_count, 0);
    assert!(!thread.is_liked);
    assert_eq!(*thread, rendered);

    // A connected client prepends without re-fetching.
    let mut client = ClientStore::new(viewer);
    client.apply(&event);
    assert_eq!(client.threads().len(), 1);
    assert_eq!(client.threads()[0].content, "hello");
}

#[tokio::test]
async fn like_toggle_is_symmetric_and_scoped_to_the_actor() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let liker = h.repos.seed_user("Grace Hopper");
    let thread = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "like me".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");

    let mut rx = h.fanout.subscribe();
    let first = h
        .likes
        .toggle(Actor { id: liker }, thread.id)
        .await
        .expect("first toggle");
    assert!(first.liked);
    assert_eq!(first.count, 1);

    let event = assert_single_event(&mut rx);
    assert_eq!(
        event,
        MutationEvent::LikeToggled {
            thread_id: thread.id,
            count: 1,
            user_id: liker,
            liked: true,
        }
    );

    // The liker's client flips is_liked; another viewer's does not.
    let mut likers_client = ClientStore::new(liker);
    let mut authors_client = ClientStore::new(author);
    likers_client.set_threads(vec![thread.clone()]);
    authors_client.set_threads(vec![thread.clone()]);
    likers_client.apply(&event);
    authors_client.apply(&event);
    assert!(likers_client.threads()[0].is_liked);
    assert_eq!(likers_client.threads()[0].like_count, 1);
    assert!(!authors_client.threads()[0].is_liked);
    assert_eq!(authors_client.threads()[0].like_count, 1);

    // Second sequential toggle returns to the original state.
    let second = h
        .likes
        .toggle(Actor { id: liker }, thread.id)
        .await
        .expect("second toggle");
    assert!(!second.liked);
    assert_eq!(second.count, 0);
    assert!(h.repos.likes.lock().unwrap().is_empty());

    let event = assert_single_event(&mut rx);
    assert_eq!(
        event,
        MutationEvent::LikeToggled {
            thread_id: thread.id,
            count: 0,
            user_id: liker,
            liked: false,
        }
    );
}

#[tokio::test]
async fn self_follow_is_rejected_with_no_write_and_no_event() {
    let h = harness();
    let user = h.repos.seed_user("Ada Lovelace");

    let mut rx = h.fanout.subscribe();
    let err = h
        .follows
        .toggle(Actor { id: user }, user)
        .await
        .expect_err("self-follow must fail");

    assert!(err.is_unauthorized());
    assert!(h.repos.follows.lock().unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn non_owner_delete_is_rejected_and_leaves_the_thread_intact() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let intruder = h.repos.seed_user("Grace Hopper");
    let thread = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "mine".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");

    let mut rx = h.fanout.subscribe();
    let err = h
        .threads
        .delete_thread(Actor { id: intruder }, thread.id)
        .await
        .expect_err("non-owner delete must fail");

    assert!(err.is_unauthorized());
    assert_eq!(h.repos.threads.lock().unwrap().len(), 1);
    assert!(rx.try_recv().is_err());

    // The owner still can.
    h.threads
        .delete_thread(Actor { id: author }, thread.id)
        .await
        .expect("owner delete");
    assert!(h.repos.threads.lock().unwrap().is_empty());
    let event = assert_single_event(&mut rx);
    assert_eq!(event, MutationEvent::ThreadDeleted { id: thread.id });
}

#[tokio::test]
async fn thread_delete_cascades_and_redirects_detail_viewers() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let replier = h.repos.seed_user("Grace Hopper");
    let thread = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "doomed".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");
    h.replies
        .create_reply(
            Actor { id: replier },
            thread.id,
            CreateReplyCommand {
                content: "first".to_string(),
                image: None,
            },
        )
        .await
        .expect("create reply");
    h.likes
        .toggle(Actor { id: replier }, thread.id)
        .await
        .expect("like");

    // Warm detail and reply pages for the doomed thread.
    h.cache
        .put(keys::thread_detail(thread.id, replier), Bytes::from("{}"));
    h.cache.put(
        format!("{}p1:l10:screated_at:desc", keys::replies_prefix(thread.id)),
        Bytes::from("[]"),
    );

    let mut rx = h.fanout.subscribe();
    h.threads
        .delete_thread(Actor { id: author }, thread.id)
        .await
        .expect("delete thread");

    // One transaction took the dependent rows with it.
    assert!(h.repos.threads.lock().unwrap().is_empty());
    assert!(h.repos.replies.lock().unwrap().is_empty());
    assert!(h.repos.likes.lock().unwrap().is_empty());

    // Declared prefixes are empty.
    assert!(h.cache.scan(keys::THREADS_PREFIX, None, 100).keys.is_empty());
    assert!(
        h.cache
            .scan(&keys::thread_prefix(thread.id), None, 100)
            .keys
            .is_empty()
    );
    assert!(
        h.cache
            .scan(&keys::replies_prefix(thread.id), None, 100)
            .keys
            .is_empty()
    );

    // A client showing the detail view clears it and flags a redirect.
    let event = assert_single_event(&mut rx);
    let mut client = ClientStore::new(replier);
    let detail = h
        .repos
        .thread_view_of(thread.id, replier)
        .expect("view lookup");
    assert!(detail.is_none(), "thread is gone from the store");
    client.set_thread_detail(thread.clone(), vec![]);
    client.apply(&event);
    assert!(client.thread_detail().is_none());
    assert!(client.take_detail_redirect());
}

#[tokio::test]
async fn reply_create_updates_counts_and_evicts_reply_prefixes() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let replier = h.repos.seed_user("Grace Hopper");
    let thread = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "discuss".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");

    h.cache.put(
        format!("{}p1:l10:screated_at:desc", keys::replies_prefix(thread.id)),
        Bytes::from("[]"),
    );
    h.cache
        .put(keys::thread_detail(thread.id, author), Bytes::from("{}"));
    h.cache.put(
        format!("{}{}:p1:l10:screated_at:desc", keys::THREADS_PREFIX, author),
        Bytes::from("[]"),
    );

    let mut rx = h.fanout.subscribe();
    let reply = h
        .replies
        .create_reply(
            Actor { id: replier },
            thread.id,
            CreateReplyCommand {
                content: "me first".to_string(),
                image: None,
            },
        )
        .await
        .expect("create reply");

    assert!(
        h.cache
            .scan(&keys::replies_prefix(thread.id), None, 100)
            .keys
            .is_empty()
    );
    assert!(
        h.cache
            .scan(&keys::thread_prefix(thread.id), None, 100)
            .keys
            .is_empty()
    );
    assert!(h.cache.scan(keys::THREADS_PREFIX, None, 100).keys.is_empty());

    let event = assert_single_event(&mut rx);
    assert_eq!(
        event,
        MutationEvent::ReplyCreated {
            reply: reply.clone(),
            thread_id: thread.id,
            reply_count: 1,
        }
    );

    // A client on the detail view gains the row and the replaced count.
    let mut client = ClientStore::new(author);
    client.set_threads(vec![thread.clone()]);
    client.set_thread_detail(thread.clone(), vec![]);
    client.apply(&event);
    assert_eq!(client.replies().len(), 1);
    assert_eq!(client.threads()[0].reply_count, 1);
    assert_eq!(client.thread_detail().unwrap().reply_count, 1);

    // Replaying the same event does not double-count.
    client.apply(&event);
    assert_eq!(client.replies().len(), 1);
    assert_eq!(client.threads()[0].reply_count, 1);
}

#[tokio::test]
async fn reply_delete_requires_ownership_and_replaces_counts() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let replier = h.repos.seed_user("Grace Hopper");
    let thread = h
        .threads
        .create_thread(
            Actor { id: author },
            CreateThreadCommand {
                content: "discuss".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");
    let reply = h
        .replies
        .create_reply(
            Actor { id: replier },
            thread.id,
            CreateReplyCommand {
                content: "oops".to_string(),
                image: None,
            },
        )
        .await
        .expect("create reply");

    let mut rx = h.fanout.subscribe();
    let err = h
        .replies
        .delete_reply(Actor { id: author }, reply.id)
        .await
        .expect_err("only the reply creator may delete");
    assert!(err.is_unauthorized());
    assert!(rx.try_recv().is_err());

    h.replies
        .delete_reply(Actor { id: replier }, reply.id)
        .await
        .expect("creator delete");
    let event = assert_single_event(&mut rx);
    assert_eq!(
        event,
        MutationEvent::ReplyDeleted {
            id: reply.id,
            thread_id: thread.id,
            reply_count: 0,
        }
    );
}

#[tokio::test]
async fn follow_toggle_evicts_people_lists_and_the_followers_feed() {
    let h = harness();
    let follower = h.repos.seed_user("Ada Lovelace");
    let target = h.repos.seed_user("Grace Hopper");
    let bystander = h.repos.seed_user("Katherine Johnson");

    h.cache.put(
        format!("{}{}:qg:p1:l10:screated_at:desc", keys::USERS_PREFIX, follower),
        Bytes::from("[]"),
    );
    h.cache.put(
        format!("{}{}:p1:l10:screated_at:desc", keys::THREADS_PREFIX, follower),
        Bytes::from("[]"),
    );
    let bystander_feed = format!(
        "{}{}:p1:l10:screated_at:desc",
        keys::THREADS_PREFIX, bystander
    );
    h.cache.put(bystander_feed.clone(), Bytes::from("[]"));

    let mut rx = h.fanout.subscribe();
    let outcome = h
        .follows
        .toggle(Actor { id: follower }, target)
        .await
        .expect("follow");
    assert!(outcome.following);

    // People lists and the follower's own feed are evicted; an
    // unrelated viewer's feed is not.
    assert!(h.cache.scan(keys::USERS_PREFIX, None, 100).keys.is_empty());
    assert!(
        h.cache
            .scan(&keys::feed_prefix(follower), None, 100)
            .keys
            .is_empty()
    );
    assert!(h.cache.get(&bystander_feed).is_some());

    let event = assert_single_event(&mut rx);
    let MutationEvent::FollowToggled {
        follower_id,
        following_id,
        following,
        user,
    } = &event
    else {
        panic!("expected FollowToggled, got {}", event.kind());
    };
    assert_eq!(*follower_id, follower);
    assert_eq!(*following_id, target);
    assert!(*following);
    assert!(user.is_followed);

    // The follower's client moves the target into its following set.
    let mut client = ClientStore::new(follower);
    client.set_suggested(vec![user.clone()]);
    client.apply(&event);
    assert!(client.suggested().is_empty());
    assert_eq!(client.following().len(), 1);
    assert!(client.take_counts_stale());

    // Unfollow restores the edge-free state.
    let outcome = h
        .follows
        .toggle(Actor { id: follower }, target)
        .await
        .expect("unfollow");
    assert!(!outcome.following);
    assert!(h.repos.follows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn feed_read_is_cached_until_a_mutation_evicts_it() {
    let h = harness();
    let author = h.repos.seed_user("Ada Lovelace");
    let actor = Actor { id: author };

    h.threads
        .create_thread(
            actor,
            CreateThreadCommand {
                content: "first".to_string(),
                image: None,
            },
        )
        .await
        .expect("create thread");

    let page = PageRequest::default();
    let sort = SortSpec::default();
    let first = h
        .threads
        .list_feed(actor, page, sort)
        .await
        .expect("first read");
    assert_eq!(first.items.len(), 1);

    // The page is now resident; a second identical read serves it even
    // if the store changes underneath (accepted staleness inside TTL).
    h.repos.seed_user("Grace Hopper");
    let cached = h
        .threads
        .list_feed(actor, page, sort)
        .await
        .expect("cached read");
    assert_eq!(cached, first);

    // A thread mutation evicts; the next read recomputes.
    h.threads
        .create_thread(
            actor,
            CreateThreadCommand {
                content: "second".to_string(),
                image: None,
            },
        )
        .await
        .expect("second thread");
    let fresh = h
        .threads
        .list_feed(actor, page, sort)
        .await
        .expect("fresh read");
    assert_eq!(fresh.items.len(), 2);
    assert_eq!(fresh.total, 2);
}
