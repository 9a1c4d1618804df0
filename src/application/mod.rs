//! Application services and their seams.

pub mod error;
pub mod follows;
pub mod likes;
pub mod pagination;
mod read_through;
pub mod replies;
pub mod repos;
pub mod sessions;
pub mod threads;
pub mod users;
