//! Types shared by the API and DB representations.

pub mod candidate;
pub mod election;
pub mod role;
pub mod user;
