//! kudoscache library
//!
//! Expiration-aware caching for the API calls behind member recognition and
//! performance reports. Exposed as a library so integration tests and other
//! report tooling can share the same cache.

pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
