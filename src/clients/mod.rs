//! API clients backed by the response cache
//!
//! Each client wraps its remote calls in
//! [`CacheManager::get_or_fetch`](crate::cache::CacheManager::get_or_fetch):
//! a fresh cache entry is returned as-is, otherwise the call is made, its
//! result saved, and any remote error passed straight back to the caller.

pub mod slack;

pub use slack::{SlackClient, SlackError, SlackMessage, SlackUser};
