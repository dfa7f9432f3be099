use serde::{Deserialize, Serialize};

use crate::model::{
    api::ApiId,
    common::{election::ElectionStatus, role::Role},
};

/// Activity in one role so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleProgress {
    pub role: Role,
    pub votes: u64,
    /// Votes as a percentage of eligible voters.
    pub vote_rate: f64,
    pub recommendations: u64,
    /// Candidates who have accepted.
    pub accepted_candidates: u64,
}

/// How far along an election is, for admins and auditors. Available in any
/// status and never names who is ahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionProgress {
    pub election_id: ApiId,
    pub election_name: String,
    pub election_status: ElectionStatus,
    pub total_eligible_voters: u64,
    pub total_voters: u64,
    pub total_votes: u64,
    pub total_recommendations: u64,
    pub total_candidates: u64,
    /// Votes cast as a percentage of every vote that could be cast.
    pub participation_rate: f64,
    /// Every role, in role order.
    pub roles: Vec<RoleProgress>,
}
