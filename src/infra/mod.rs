//! Infrastructure adapters: Postgres, HTTP, uploads, telemetry.

pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod uploads;
