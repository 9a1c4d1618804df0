pub mod follows;
pub mod likes;
pub mod replies;
pub mod stream;
pub mod threads;
pub mod uploads;
pub mod users;
