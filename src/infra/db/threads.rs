use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use circle_api_types::ThreadView;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    CascadeDeletedImages, CreateThreadParams, RepoError, SortSpec, ThreadsRepo,
};
use crate::domain::entities::ThreadRecord;
use crate::domain::types::SortField;

use super::{PostgresRepositories, map_sqlx_error};

const THREAD_COLUMNS: &str =
    "id, content, image, created_at, created_by, updated_at, updated_by";

/// Rendered-view projection shared by the feed and detail queries. The
/// viewer id is bound once per statement for the `is_liked` probe.
const THREAD_VIEW_SELECT: &str = "SELECT t.id, t.content, t.image, \
     u.username, u.full_name, u.photo_profile, \
     (SELECT COUNT(*) FROM replies r WHERE r.thread_id = t.id) AS reply_count, \
     (SELECT COUNT(*) FROM likes l WHERE l.thread_id = t.id) AS like_count, \
     EXISTS(SELECT 1 FROM likes l WHERE l.thread_id = t.id AND l.user_id = ";

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: Uuid,
    content: String,
    image: Option<String>,
    created_at: OffsetDateTime,
    created_by: Uuid,
    updated_at: OffsetDateTime,
    updated_by: Uuid,
}

impl From<ThreadRow> for ThreadRecord {
    fn from(row: ThreadRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            image: row.image,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

fn feed_order_expr(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "t.created_at",
        SortField::UpdatedAt => "t.updated_at",
        SortField::Username => "u.username",
        SortField::FullName => "u.full_name",
    }
}

fn push_view_select<'q>(qb: &mut QueryBuilder<'q, Postgres>, viewer: Uuid) {
    qb.push(THREAD_VIEW_SELECT);
    qb.push_bind(viewer);
    qb.push(
        ") AS is_liked, t.created_at, t.created_by, t.updated_at, t.updated_by \
         FROM threads t JOIN users u ON u.id = t.created_by ",
    );
}

#[async_trait]
impl ThreadsRepo for PostgresRepositories {
    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError> {
        let row = sqlx::query_as::<_, ThreadRow>(&format!(
            "INSERT INTO threads (id, content, image, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {THREAD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.content)
        .bind(&params.image)
        .bind(params.created_by)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ThreadRecord>, RepoError> {
        let row = sqlx::query_as::<_, ThreadRow>(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<CascadeDeletedImages, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let thread_image = sqlx::query_scalar::<_, Option<String>>(
            "SELECT image FROM threads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let reply_images = sqlx::query_scalar::<_, String>(
            "SELECT image FROM replies WHERE thread_id = $1 AND image IS NOT NULL",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM likes WHERE thread_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM replies WHERE thread_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM threads WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        // All-or-nothing: any error above dropped the transaction and
        // rolled the partial deletes back.
        tx.commit().await.map_err(map_sqlx_error)?;

        let mut images = reply_images;
        if let Some(image) = thread_image {
            images.push(image);
        }
        Ok(CascadeDeletedImages { images })
    }

    async fn feed(
        &self,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ThreadView>, RepoError> {
        let scope = " WHERE (t.created_by = $1 OR EXISTS \
             (SELECT 1 FROM followings f \
              WHERE f.follower_id = $1 AND f.following_id = t.created_by))";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM threads t JOIN users u ON u.id = t.created_by {scope}"
        ))
        .bind(viewer)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("");
        push_view_select(&mut qb, viewer);
        qb.push(
            "WHERE (t.created_by = ",
        );
        qb.push_bind(viewer);
        qb.push(" OR EXISTS (SELECT 1 FROM followings f WHERE f.follower_id = ");
        qb.push_bind(viewer);
        qb.push(" AND f.following_id = t.created_by))");
        qb.push(" ORDER BY ");
        qb.push(feed_order_expr(sort.field));
        qb.push(" ");
        qb.push(sort.order.as_sql());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));

        let items = qb
            .build_query_as::<ThreadView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }

    async fn thread_view(
        &self,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<Option<ThreadView>, RepoError> {
        let mut qb = QueryBuilder::new("");
        push_view_select(&mut qb, viewer);
        qb.push("WHERE t.id = ");
        qb.push_bind(id);

        qb.build_query_as::<ThreadView>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
