use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{candidate::CandidateStatus, role::Role},
    mongodb::Id,
};

/// The natural key of a candidacy: one user standing for one role in one election.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct CandidateKey {
    pub user_id: Id,
    pub election_id: Id,
    pub for_role: Role,
}

/// A nominee for a role, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub user_id: Id,
    pub election_id: Id,
    pub for_role: Role,
    pub status: CandidateStatus,
    /// The candidate's own statement, given on acceptance.
    pub statement: Option<String>,
    /// Number of votes cast for this candidate.
    pub vote_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// A freshly nominated candidate, awaiting invitation.
    pub fn pending(key: CandidateKey) -> Self {
        Self {
            id: Id::new(),
            user_id: key.user_id,
            election_id: key.election_id,
            for_role: key.for_role,
            status: CandidateStatus::Pending,
            statement: None,
            vote_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            user_id: self.user_id,
            election_id: self.election_id,
            for_role: self.for_role,
        }
    }
}
