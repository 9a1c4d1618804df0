use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{LikesRepo, RepoError};
use crate::domain::entities::LikeRecord;

use super::{PostgresRepositories, map_sqlx_error};

const LIKE_COLUMNS: &str =
    "id, thread_id, user_id, created_at, created_by, updated_at, updated_by";

#[derive(sqlx::FromRow)]
struct LikeRow {
    id: Uuid,
    thread_id: Uuid,
    user_id: Uuid,
    created_at: OffsetDateTime,
    created_by: Uuid,
    updated_at: OffsetDateTime,
    updated_by: Uuid,
}

impl From<LikeRow> for LikeRecord {
    fn from(row: LikeRow) -> Self {
        Self {
            id: row.id,
            thread_id: row.thread_id,
            user_id: row.user_id,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

#[async_trait]
impl LikesRepo for PostgresRepositories {
    async fn find_for(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
    ) -> Result<Option<LikeRecord>, RepoError> {
        let row = sqlx::query_as::<_, LikeRow>(&format!(
            "SELECT {LIKE_COLUMNS} FROM likes WHERE user_id = $1 AND thread_id = $2"
        ))
        .bind(user_id)
        .bind(thread_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn create_like(&self, user_id: Uuid, thread_id: Uuid) -> Result<LikeRecord, RepoError> {
        let row = sqlx::query_as::<_, LikeRow>(&format!(
            "INSERT INTO likes (id, thread_id, user_id, created_by, updated_by) \
             VALUES ($1, $2, $3, $3, $3) RETURNING {LIKE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(thread_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_like(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
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
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
