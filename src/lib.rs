//! Circle, a small social feed server.
//!
//! Threads, replies, likes and follow edges over Postgres, fronted by a
//! TTL'd result cache with prefix invalidation and a broadcast mutation
//! event channel exposed as server-sent events. Every mutation handler
//! follows the same protocol: write to the store, invalidate the stale
//! cache prefixes, publish the event, in that order.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod realtime;
