use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// An office elected independently within an election.
///
/// The declaration order is significant: it is the order in which roles are
/// reported and processed.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    President,
    VicePresident,
    Secretary,
    Treasurer,
    Auditor,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 5] = [
        Role::President,
        Role::VicePresident,
        Role::Secretary,
        Role::Treasurer,
        Role::Auditor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::President => "PRESIDENT",
            Role::VicePresident => "VICE_PRESIDENT",
            Role::Secretary => "SECRETARY",
            Role::Treasurer => "TREASURER",
            Role::Auditor => "AUDITOR",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
