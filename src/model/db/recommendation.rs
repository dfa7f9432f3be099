use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::role::Role, mongodb::Id};

/// One member backing one candidate for one role, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub recommender_id: Id,
    pub candidate_id: Id,
    pub for_role: Role,
    pub comment: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Per-recommender bookkeeping document.
///
/// Every recommendation transaction writes to the recommender's ledger
/// before counting their existing recommendations, so that two concurrent
/// recommendations from the same member conflict instead of both passing
/// the limit check.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RecommenderLedger {
    pub election_id: Id,
    pub recommender_id: Id,
    pub writes: i64,
}
