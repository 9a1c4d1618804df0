//! Cache key and prefix builders.
//!
//! Keys are `{prefix}{scope}:p{page}:l{limit}:s{sort}:{order}`: the
//! resource prefix, the owning identifier for scoped queries, then the
//! query shape. Mutations evict by prefix, so every key a query family
//! can produce must share that family's prefix.

use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::types::{SortField, SortOrder};

/// All viewer-scoped feed pages. A thread mutation evicts this.
pub const THREADS_PREFIX: &str = "threads:";
/// Thread detail pages.
pub const THREAD_PREFIX: &str = "thread:";
/// Per-thread reply list pages.
pub const REPLIES_PREFIX: &str = "replies:";
/// People list pages (with `is_followed` annotations).
pub const USERS_PREFIX: &str = "users:";
/// User profile detail pages.
pub const USER_PREFIX: &str = "user:";

fn query_suffix(page: &PageRequest, sort_by: SortField, order: SortOrder) -> String {
    format!(
        "p{}:l{}:s{}:{}",
        page.page(),
        page.limit(),
        sort_by.as_str(),
        order.as_str()
    )
}

/// One page of `viewer`'s followed feed.
pub fn feed_page(viewer: Uuid, page: &PageRequest, sort_by: SortField, order: SortOrder) -> String {
    format!(
        "{THREADS_PREFIX}{viewer}:{}",
        query_suffix(page, sort_by, order)
    )
}

/// Every feed page cached for `viewer`.
pub fn feed_prefix(viewer: Uuid) -> String {
    format!("{THREADS_PREFIX}{viewer}:")
}

/// A thread's detail view, keyed per viewer (`is_liked` differs).
pub fn thread_detail(id: Uuid, viewer: Uuid) -> String {
    format!("{THREAD_PREFIX}{id}:{viewer}")
}

/// Every cached detail view of one thread, any viewer.
pub fn thread_prefix(id: Uuid) -> String {
    format!("{THREAD_PREFIX}{id}:")
}

/// One page of a thread's replies.
pub fn replies_page(
    thread_id: Uuid,
    page: &PageRequest,
    sort_by: SortField,
    order: SortOrder,
) -> String {
    format!(
        "{REPLIES_PREFIX}{thread_id}:{}",
        query_suffix(page, sort_by, order)
    )
}

/// Every cached reply page of one thread.
pub fn replies_prefix(thread_id: Uuid) -> String {
    format!("{REPLIES_PREFIX}{thread_id}:")
}

/// One page of the people list for `viewer`, optionally filtered.
pub fn users_page(
    viewer: Uuid,
    search: Option<&str>,
    page: &PageRequest,
    sort_by: SortField,
    order: SortOrder,
) -> String {
    format!(
        "{USERS_PREFIX}{viewer}:q{}:{}",
        search.unwrap_or_default(),
        query_suffix(page, sort_by, order)
    )
}

/// A user's profile detail view.
pub fn user_detail(id: Uuid) -> String {
    format!("{USER_PREFIX}{id}")
}

/// Every cached view of one user profile.
pub fn user_prefix(id: Uuid) -> String {
    format!("{USER_PREFIX}{id}")
}
