use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use circle_api_types::ReplyView;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{CreateReplyParams, RepliesRepo, RepoError, SortSpec};
use crate::domain::entities::ReplyRecord;
use crate::domain::types::SortField;

use super::{PostgresRepositories, map_sqlx_error};

const REPLY_COLUMNS: &str =
    "id, thread_id, user_id, content, image, created_at, created_by, updated_at, updated_by";

const REPLY_VIEW_SELECT: &str = "SELECT r.id, r.thread_id, r.content, r.image, \
     u.username, u.full_name, u.photo_profile, \
     r.created_at, r.created_by, r.updated_at, r.updated_by \
     FROM replies r JOIN users u ON u.id = r.created_by ";

#[derive(sqlx::FromRow)]
struct ReplyRow {
    id: Uuid,
    thread_id: Uuid,
    user_id: Uuid,
    content: String,
    image: Option<String>,
    created_at: OffsetDateTime,
    created_by: Uuid,
    updated_at: OffsetDateTime,
    updated_by: Uuid,
}

impl From<ReplyRow> for ReplyRecord {
    fn from(row: ReplyRow) -> Self {
        Self {
            id: row.id,
            thread_id: row.thread_id,
            user_id: row.user_id,
            content: row.content,
            image: row.image,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

fn reply_order_expr(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "r.created_at",
        SortField::UpdatedAt => "r.updated_at",
        SortField::Username => "u.username",
        SortField::FullName => "u.full_name",
    }
}

#[async_trait]
impl RepliesRepo for PostgresRepositories {
    async fn create_reply(&self, params: CreateReplyParams) -> Result<ReplyRecord, RepoError> {
        let row = sqlx::query_as::<_, ReplyRow>(&format!(
            "INSERT INTO replies (id, thread_id, user_id, content, image, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $3, $3) RETURNING {REPLY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.thread_id)
        .bind(params.created_by)
        .bind(&params.content)
        .bind(&params.image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReplyRecord>, RepoError> {
        let row = sqlx::query_as::<_, ReplyRow>(&format!(
            "SELECT {REPLY_COLUMNS} FROM replies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn delete_reply(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM replies WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn count_for_thread(&self, thread_id: Uuid) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM replies WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_for_thread(
        &self,
        thread_id: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<ReplyView>, RepoError> {
        let total = self.count_for_thread(thread_id).await?;

        let mut qb = QueryBuilder::new(REPLY_VIEW_SELECT);
        qb.push("WHERE r.thread_id = ");
        qb.push_bind(thread_id);
        qb.push(" ORDER BY ");
        qb.push(reply_order_expr(sort.field));
        qb.push(" ");
        qb.push(sort.order.as_sql());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));

        let items = qb
            .build_query_as::<ReplyView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }

    async fn reply_view(&self, id: Uuid) -> Result<Option<ReplyView>, RepoError> {
        let mut qb = QueryBuilder::new(REPLY_VIEW_SELECT);
        qb.push("WHERE r.id = ");
        qb.push_bind(id);

        qb.build_query_as::<ReplyView>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
