use serde::{Deserialize, Serialize};

use crate::model::{
    api::ApiId,
    common::{election::ElectionStatus, role::Role},
};

/// Turnout figures for a closed election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turnout {
    /// Active users in the directory.
    pub total_eligible_voters: u64,
    /// Distinct users who cast at least one vote.
    pub total_voters: u64,
    /// Percentage, rounded to 2 decimal places.
    pub turnout_rate: f64,
}

/// Votes received by one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub candidate_id: ApiId,
    pub user_id: ApiId,
    pub votes: u64,
    /// Share of the role's votes, rounded to 2 decimal places.
    pub vote_percentage: f64,
}

/// The winner of a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub candidate_id: ApiId,
    pub user_id: ApiId,
    pub votes: u64,
    /// Share of the role's votes, rounded to 2 decimal places.
    pub vote_percentage: f64,
    /// Another candidate received as many votes; the earliest candidacy won.
    pub tie: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleWinner {
    pub role: Role,
    pub winner: Winner,
}

/// The full breakdown of one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResult {
    pub role: Role,
    pub total_votes: u64,
    /// Candidates by descending vote count.
    pub candidates: Vec<CandidateTally>,
    pub winner: Winner,
}

/// Public results: turnout and winners only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub election_id: ApiId,
    pub election_name: String,
    pub election_status: ElectionStatus,
    #[serde(flatten)]
    pub turnout: Turnout,
    pub winners: Vec<RoleWinner>,
}

/// Full results, for admins and auditors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
    pub election_id: ApiId,
    pub election_name: String,
    pub election_status: ElectionStatus,
    #[serde(flatten)]
    pub turnout: Turnout,
    pub roles: Vec<RoleResult>,
}
