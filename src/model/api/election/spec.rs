use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::election::{ElectionDates, ElectionStatus};

/// How many roles a member may recommend for when not specified.
pub const DEFAULT_MAX_RECOMMENDATIONS: u32 = 3;

fn default_max_recommendations() -> u32 {
    DEFAULT_MAX_RECOMMENDATIONS
}

/// A new election, as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub dates: ElectionDates,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: u32,
}

/// A partial update of an election. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub recommendation_start: Option<DateTime<Utc>>,
    pub recommendation_end: Option<DateTime<Utc>>,
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
    pub max_recommendations: Option<u32>,
}

impl ElectionUpdate {
    /// Overlay the changed dates onto `dates`.
    pub fn merge_dates(&self, dates: ElectionDates) -> ElectionDates {
        ElectionDates {
            recommendation_start: self.recommendation_start.unwrap_or(dates.recommendation_start),
            recommendation_end: self.recommendation_end.unwrap_or(dates.recommendation_end),
            voting_start: self.voting_start.unwrap_or(dates.voting_start),
            voting_end: self.voting_end.unwrap_or(dates.voting_end),
        }
    }
}

/// Request body for moving an election to a new status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ElectionStatus,
}

/// Request body for enabling or disabling an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChange {
    pub is_active: bool,
}
