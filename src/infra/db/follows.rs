use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use circle_api_types::{FollowCounts, UserView};

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{FollowsRepo, RepoError, SortSpec};
use crate::domain::entities::FollowingRecord;
use crate::domain::types::SortField;

use super::{PostgresRepositories, map_sqlx_error};

const FOLLOWING_COLUMNS: &str =
    "id, follower_id, following_id, created_at, created_by, updated_at, updated_by";

#[derive(sqlx::FromRow)]
struct FollowingRow {
    id: Uuid,
    follower_id: Uuid,
    following_id: Uuid,
    created_at: OffsetDateTime,
    created_by: Uuid,
    updated_at: OffsetDateTime,
    updated_by: Uuid,
}

impl From<FollowingRow> for FollowingRecord {
    fn from(row: FollowingRow) -> Self {
        Self {
            id: row.id,
            follower_id: row.follower_id,
            following_id: row.following_id,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

/// Follow lists sort on the edge's recency; name sorts fall through to
/// the joined profile columns.
fn edge_order_expr(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "f.created_at",
        SortField::UpdatedAt => "f.updated_at",
        SortField::Username => "u.username",
        SortField::FullName => "u.full_name",
    }
}

fn suggested_order_expr(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "u.created_at",
        SortField::UpdatedAt => "u.updated_at",
        SortField::Username => "u.username",
        SortField::FullName => "u.full_name",
    }
}

fn push_annotated_user_columns<'q>(qb: &mut QueryBuilder<'q, Postgres>, viewer: Uuid) {
    qb.push(
        "u.id, u.username, u.full_name, u.email, u.photo_profile, u.bio, \
         EXISTS(SELECT 1 FROM followings v WHERE v.follower_id = ",
    );
    qb.push_bind(viewer);
    qb.push(" AND v.following_id = u.id) AS is_followed, u.created_at, u.updated_at ");
}

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn find_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<Option<FollowingRecord>, RepoError> {
        let row = sqlx::query_as::<_, FollowingRow>(&format!(
            "SELECT {FOLLOWING_COLUMNS} FROM followings \
             WHERE follower_id = $1 AND following_id = $2"
        ))
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn create_edge(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<FollowingRecord, RepoError> {
        let row = sqlx::query_as::<_, FollowingRow>(&format!(
            "INSERT INTO followings (id, follower_id, following_id, created_by, updated_by) \
             VALUES ($1, $2, $3, $2, $2) RETURNING {FOLLOWING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_edge(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM followings WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn counts_for(&self, user_id: Uuid) -> Result<FollowCounts, RepoError> {
        let total_following = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM followings WHERE follower_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let total_followers = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM followings WHERE following_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FollowCounts {
            total_following,
            total_followers,
        })
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM followings WHERE follower_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        push_annotated_user_columns(&mut qb, viewer);
        qb.push("FROM followings f JOIN users u ON u.id = f.following_id WHERE f.follower_id = ");
        qb.push_bind(user_id);
        push_page_tail(&mut qb, edge_order_expr(sort.field), sort, page);

        let items = qb
            .build_query_as::<UserView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM followings WHERE following_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        push_annotated_user_columns(&mut qb, viewer);
        qb.push("FROM followings f JOIN users u ON u.id = f.follower_id WHERE f.following_id = ");
        qb.push_bind(user_id);
        push_page_tail(&mut qb, edge_order_expr(sort.field), sort, page);

        let items = qb
            .build_query_as::<UserView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }

    async fn list_suggested(
        &self,
        user_id: Uuid,
        viewer: Uuid,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users u WHERE u.id <> $1 AND NOT EXISTS \
             (SELECT 1 FROM followings f \
              WHERE f.follower_id = $1 AND f.following_id = u.id)",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        push_annotated_user_columns(&mut qb, viewer);
        qb.push("FROM users u WHERE u.id <> ");
        qb.push_bind(user_id);
        qb.push(" AND NOT EXISTS (SELECT 1 FROM followings f WHERE f.follower_id = ");
        qb.push_bind(user_id);
        qb.push(" AND f.following_id = u.id)");
        push_page_tail(&mut qb, suggested_order_expr(sort.field), sort, page);

        let items = qb
            .build_query_as::<UserView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }
}

fn push_page_tail(
    qb: &mut QueryBuilder<'_, Postgres>,
    order_expr: &'static str,
    sort: SortSpec,
    page: PageRequest,
) {
    qb.push(" ORDER BY ");
    qb.push(order_expr);
    qb.push(" ");
    qb.push(sort.order.as_sql());
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(page.limit()));
}
