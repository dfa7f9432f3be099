use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Where a nominee stands in the candidacy process.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    /// Recommended at least once, not yet invited.
    Pending,
    /// Invited to stand, awaiting a response.
    Invited,
    /// Standing for election; the only votable status.
    Accepted,
    /// Refused the invitation.
    Declined,
    /// Stood down after being invited or accepting.
    Withdrawn,
}

impl Display for CandidateStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CandidateStatus::Pending => "PENDING",
            CandidateStatus::Invited => "INVITED",
            CandidateStatus::Accepted => "ACCEPTED",
            CandidateStatus::Declined => "DECLINED",
            CandidateStatus::Withdrawn => "WITHDRAWN",
        };
        write!(f, "{name}")
    }
}

impl From<CandidateStatus> for Bson {
    fn from(status: CandidateStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
