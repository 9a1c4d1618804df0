use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use circle_api_types::UserView;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    CreateUserParams, RepoError, SortSpec, UpdateUserParams, UserQueryFilter, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::types::SortField;

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str = "id, username, full_name, email, password_hash, photo_profile, \
     bio, created_at, created_by, updated_at, updated_by";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: Option<String>,
    full_name: String,
    email: String,
    password_hash: String,
    photo_profile: Option<String>,
    bio: Option<String>,
    created_at: OffsetDateTime,
    created_by: Option<Uuid>,
    updated_at: OffsetDateTime,
    updated_by: Option<Uuid>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            email: row.email,
            password_hash: row.password_hash,
            photo_profile: row.photo_profile,
            bio: row.bio,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

fn user_order_expr(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "u.created_at",
        SortField::UpdatedAt => "u.updated_at",
        SortField::Username => "u.username",
        SortField::FullName => "u.full_name",
    }
}

/// Select the people-list projection with `is_followed` evaluated for
/// the bound viewer.
fn push_user_view_select<'q>(qb: &mut QueryBuilder<'q, Postgres>, viewer: Uuid) {
    qb.push(
        "SELECT u.id, u.username, u.full_name, u.email, u.photo_profile, u.bio, \
         EXISTS(SELECT 1 FROM followings f WHERE f.follower_id = ",
    );
    qb.push_bind(viewer);
    qb.push(
        " AND f.following_id = u.id) AS is_followed, \
         u.created_at, u.updated_at FROM users u ",
    );
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, full_name, email, password_hash) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(&params.full_name)
            .bind(&params.email)
            .bind(&params.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        // The account is its own creator; stamped in the same transaction.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET created_by = $1, updated_by = $1 WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1"
        ))
        .bind(identifier)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn update_profile(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let mut qb = QueryBuilder::new("UPDATE users SET username = ");
        qb.push_bind(&params.username);
        qb.push(", full_name = ");
        qb.push_bind(&params.full_name);
        qb.push(", bio = ");
        qb.push_bind(&params.bio);
        if let Some(photo) = &params.photo_profile {
            qb.push(", photo_profile = ");
            qb.push_bind(photo);
        }
        qb.push(", updated_by = ");
        qb.push_bind(params.updated_by);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(params.id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), RepoError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
                .bind(&password_hash)
                .bind(id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_users(
        &self,
        viewer: Uuid,
        filter: &UserQueryFilter,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM users u WHERE 1=1 ");
        push_search_filter(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("");
        push_user_view_select(&mut qb, viewer);
        qb.push("WHERE 1=1 ");
        push_search_filter(&mut qb, filter);
        qb.push(" ORDER BY ");
        qb.push(user_order_expr(sort.field));
        qb.push(" ");
        qb.push(sort.order.as_sql());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));

        let items = qb
            .build_query_as::<UserView>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(items, total))
    }

    async fn user_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<UserView>, RepoError> {
        let mut qb = QueryBuilder::new("");
        push_user_view_select(&mut qb, viewer);
        qb.push("WHERE u.id = ");
        qb.push_bind(id);

        qb.build_query_as::<UserView>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

fn push_search_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q UserQueryFilter) {
    if let Some(search) = filter.search.as_ref() {
        qb.push(" AND (u.username ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(" OR u.full_name ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(")");
    }
}
