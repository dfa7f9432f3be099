use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::ApiId, common::role::Role};

/// The candidate chosen for each role being voted on.
///
/// Roles are ordered by declaration, which is the order they are processed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub votes: BTreeMap<Role, ApiId>,
}

/// Confirmation of a cast ballot. Deliberately omits who was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: ApiId,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleVoteStatus {
    pub role: Role,
    pub has_voted: bool,
    pub voted_at: Option<DateTime<Utc>>,
}

/// Which roles a voter has already voted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub election_id: ApiId,
    pub has_voted_any: bool,
    /// Every role, in declaration order.
    pub roles: Vec<RoleVoteStatus>,
}
