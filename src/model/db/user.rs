use serde::{Deserialize, Serialize};

use crate::model::{common::user::UserRole, mongodb::Id};

/// A user, as held by the external user directory.
///
/// Only the fields the election core reads are modelled; any others in the
/// stored document are ignored.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub role: UserRole,
    pub is_active: bool,
}
