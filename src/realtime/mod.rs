//! Real-time mutation fan-out.
//!
//! Mutation handlers publish a [`circle_api_types::MutationEvent`] after
//! each successful write; every connected subscriber receives every
//! event. Delivery is at-most-once and best-effort: nothing is
//! persisted, nothing is retried, and a client that connects after a
//! publish relies on its next cold read to observe the change.

mod channel;

pub use channel::FanoutChannel;
