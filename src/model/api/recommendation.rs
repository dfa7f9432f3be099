use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::ApiId, common::role::Role, db::recommendation::Recommendation};

/// A member's recommendation of someone for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSpec {
    pub for_role: Role,
    pub candidate_user_id: ApiId,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RecommendationSpec {
    /// The reason, with blank ones treated as absent.
    pub fn comment(&self) -> Option<String> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

/// Confirmation of a stored recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReceipt {
    pub id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub for_role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Recommendation> for RecommendationReceipt {
    fn from(recommendation: Recommendation) -> Self {
        Self {
            id: recommendation.id.into(),
            election_id: recommendation.election_id.into(),
            candidate_id: recommendation.candidate_id.into(),
            for_role: recommendation.for_role,
            created_at: recommendation.created_at,
        }
    }
}

/// Recommendations received by one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecommendations {
    pub candidate_id: ApiId,
    pub user_id: ApiId,
    pub count: u64,
    /// A sample of the most recent comments.
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecommendations {
    pub role: Role,
    pub total: u64,
    /// Candidates by descending count.
    pub candidates: Vec<CandidateRecommendations>,
}

/// Recommendation totals for an election, grouped by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationStats {
    pub election_id: ApiId,
    pub total: u64,
    pub roles: Vec<RoleRecommendations>,
}
