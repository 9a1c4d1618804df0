//! User accounts: registration, login, profiles.

use std::sync::Arc;

use circle_api_types::{MutationEvent, UserView};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::read_through::read_through;
use crate::application::repos::{
    CreateUserParams, SortSpec, UpdateUserParams, UserQueryFilter, UsersRepo,
};
use crate::application::sessions::{
    Actor, SessionError, SessionService, hash_password, verify_password,
};
use crate::cache::{CacheInvalidator, CacheStore, keys};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::realtime::FanoutChannel;

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub enum PhotoChange {
    Keep,
    Remove,
    Replace(String),
}

#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub username: Option<String>,
    pub full_name: String,
    pub bio: Option<String>,
    pub photo: PhotoChange,
}

/// A profile update plus the replaced photo path the caller should
/// unlink, if any.
#[derive(Debug, Clone)]
pub struct UpdatedUser {
    pub user: UserView,
    pub replaced_photo: Option<String>,
}

pub struct UserService {
    users: Arc<dyn UsersRepo>,
    cache: Arc<CacheStore>,
    invalidator: CacheInvalidator,
    fanout: FanoutChannel,
    sessions: Arc<SessionService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        cache: Arc<CacheStore>,
        invalidator: CacheInvalidator,
        fanout: FanoutChannel,
        sessions: Arc<SessionService>,
    ) -> Self {
        Self {
            users,
            cache,
            invalidator,
            fanout,
            sessions,
        }
    }

    pub async fn register(&self, command: RegisterCommand) -> Result<UserRecord, AppError> {
        if command.full_name.trim().is_empty() {
            return Err(AppError::validation("full name must not be empty"));
        }
        if !command.email.contains('@') {
            return Err(AppError::validation("email address is not valid"));
        }
        if self
            .users
            .find_by_identifier(&command.email)
            .await?
            .is_some()
        {
            return Err(AppError::validation("email already exists"));
        }

        let password_hash = hash_password(&command.password)?;
        self.users
            .create_user(CreateUserParams {
                full_name: command.full_name,
                email: command.email,
                password_hash,
            })
            .await
            .map_err(Into::into)
    }

    /// Verify credentials and issue a session token for the cookie.
    pub async fn login(&self, command: LoginCommand) -> Result<(UserRecord, String), AppError> {
        let user = self
            .users
            .find_by_identifier(&command.identifier)
            .await?
            .ok_or(AppError::Session(SessionError::Invalid))?;

        if !verify_password(&command.password, &user.password_hash) {
            return Err(AppError::Session(SessionError::Invalid));
        }

        let token = self.sessions.issue(user.id)?;
        Ok((user, token))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserView, AppError> {
        let key = keys::user_detail(id);
        let found: Option<UserView> = read_through(&self.cache, &key, async || {
            Ok(self.users.find_by_id(id).await?.map(view_from_record))
        })
        .await?;
        found.ok_or(AppError::NotFound)
    }

    pub async fn list_users(
        &self,
        actor: Actor,
        search: Option<String>,
        page: PageRequest,
        sort: SortSpec,
    ) -> Result<Page<UserView>, AppError> {
        let key = keys::users_page(actor.id, search.as_deref(), &page, sort.field, sort.order);
        let filter = UserQueryFilter { search };
        read_through(&self.cache, &key, async || {
            self.users.list_users(actor.id, &filter, page, sort).await
        })
        .await
    }

    /// Update the actor's own profile. Publishes `UserUpdated` so
    /// clients can patch denormalized author fields.
    pub async fn update_user(
        &self,
        actor: Actor,
        id: Uuid,
        command: UpdateUserCommand,
    ) -> Result<UpdatedUser, AppError> {
        if actor.id != id {
            return Err(DomainError::unauthorized("you may only update your own profile").into());
        }

        let existing = self.users.find_by_id(id).await?.ok_or(AppError::NotFound)?;

        let (photo_profile, replaced_photo) = match command.photo {
            PhotoChange::Keep => (None, None),
            PhotoChange::Remove => (Some(None), existing.photo_profile.clone()),
            PhotoChange::Replace(path) => (Some(Some(path)), existing.photo_profile.clone()),
        };

        let record = self
            .users
            .update_profile(UpdateUserParams {
                id,
                username: command.username,
                full_name: command.full_name,
                bio: command.bio,
                photo_profile,
                updated_by: actor.id,
            })
            .await?;
        let user = view_from_record(record);

        self.invalidator
            .invalidate_all(&[keys::USERS_PREFIX.to_string(), keys::user_prefix(id)]);
        self.fanout.publish(MutationEvent::UserUpdated {
            user: user.clone(),
        });

        Ok(UpdatedUser {
            user,
            replaced_photo,
        })
    }

    /// Change a password after verifying the current one. No cache is
    /// touched and no event is published, since credentials never appear in
    /// rendered views.
    pub async fn reset_password(
        &self,
        actor: Actor,
        id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        if actor.id != id {
            return Err(DomainError::unauthorized("you may only reset your own password").into());
        }
        let user = self.users.find_by_id(id).await?.ok_or(AppError::NotFound)?;
        if !verify_password(current, &user.password_hash) {
            return Err(AppError::Session(SessionError::Invalid));
        }
        let password_hash = hash_password(new)?;
        self.users
            .update_password(id, password_hash)
            .await
            .map_err(Into::into)
    }
}

/// Render a stored record as the public profile view. `is_followed` is a
/// viewer annotation and defaults to false here; list queries evaluate
/// it in the store instead.
pub fn view_from_record(record: UserRecord) -> UserView {
    UserView {
        id: record.id,
        username: record.username,
        full_name: record.full_name,
        email: record.email,
        photo_profile: record.photo_profile,
        bio: record.bio,
        is_followed: false,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}
