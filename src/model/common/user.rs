use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The organisational role of a user, as held by the user directory.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Member,
    Admin,
    Auditor,
}

impl From<UserRole> for Bson {
    fn from(role: UserRole) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
