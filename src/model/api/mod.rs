//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase and enum values SCREAMING_SNAKE_CASE.

pub mod auth;
pub mod candidate;
pub mod election;
pub mod pagination;
pub mod recommendation;
pub mod vote;

mod id;

pub use id::ApiId;
