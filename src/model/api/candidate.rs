use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::ApiId,
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    db::candidate::Candidate,
};

/// How many nominees are invited per role when not specified.
pub const DEFAULT_INVITATIONS: usize = 3;

fn default_invitations() -> usize {
    DEFAULT_INVITATIONS
}

/// A candidate, as shown to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub id: ApiId,
    pub user_id: ApiId,
    pub election_id: ApiId,
    pub for_role: Role,
    pub status: CandidateStatus,
    pub statement: Option<String>,
    /// Recommendations naming this nominee for this role.
    pub recommendation_count: u64,
    /// Always 0 until the election is closed.
    pub vote_count: u64,
    pub created_at: DateTime<Utc>,
}

impl CandidateView {
    pub fn new(candidate: Candidate, recommendation_count: u64, election: ElectionStatus) -> Self {
        let vote_count = if election == ElectionStatus::Closed {
            candidate.vote_count
        } else {
            0
        };
        Self {
            id: candidate.id.into(),
            user_id: candidate.user_id.into(),
            election_id: candidate.election_id.into(),
            for_role: candidate.for_role,
            status: candidate.status,
            statement: candidate.statement,
            recommendation_count,
            vote_count,
            created_at: candidate.created_at,
        }
    }
}

/// Invite the most-recommended nominees for a role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationSpec {
    pub for_role: Role,
    #[serde(default = "default_invitations")]
    pub top_n: usize,
}

/// A nominee's answer to their invitation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accepted,
    Declined,
}

impl From<Decision> for CandidateStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => CandidateStatus::Accepted,
            Decision::Declined => CandidateStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReply {
    pub decision: Decision,
    #[serde(default)]
    pub statement: Option<String>,
}
