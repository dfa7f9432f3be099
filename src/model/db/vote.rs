use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::role::Role, mongodb::Id};

/// A single ballot for a single role, as stored in the database.
///
/// The voter is retained so that the one-vote-per-role rule can be enforced
/// and audited; `ballot_hash` is a one-way token unique to this cast.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub voter_id: Id,
    pub candidate_id: Id,
    pub for_role: Role,
    pub ballot_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
