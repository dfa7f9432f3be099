use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionDates, ElectionStatus},
    mongodb::Id,
};

/// An election round, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Election name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Lifecycle status; only changed by status transitions.
    pub status: ElectionStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub recommendation_start: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub recommendation_end: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_start: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_end: DateTime<Utc>,
    /// How many roles each member may recommend someone for.
    pub max_recommendations: u32,
    /// Soft-deletion flag. Inactive elections are hidden from listings.
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Create a new election in the `Planning` status.
    pub fn new(
        name: String,
        description: Option<String>,
        dates: ElectionDates,
        max_recommendations: u32,
    ) -> Self {
        Self {
            id: Id::new(),
            name,
            description,
            status: ElectionStatus::Planning,
            recommendation_start: dates.recommendation_start,
            recommendation_end: dates.recommendation_end,
            voting_start: dates.voting_start,
            voting_end: dates.voting_end,
            max_recommendations,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// The election's date windows.
    pub fn dates(&self) -> ElectionDates {
        ElectionDates {
            recommendation_start: self.recommendation_start,
            recommendation_end: self.recommendation_end,
            voting_start: self.voting_start,
            voting_end: self.voting_end,
        }
    }

    /// Overwrite the election's date windows.
    pub fn set_dates(&mut self, dates: ElectionDates) {
        self.recommendation_start = dates.recommendation_start;
        self.recommendation_end = dates.recommendation_end;
        self.voting_start = dates.voting_start;
        self.voting_end = dates.voting_end;
    }
}
