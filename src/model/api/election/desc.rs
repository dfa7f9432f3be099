use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::ApiId,
    common::election::{ElectionDates, ElectionStatus},
    db::election::Election,
};

/// An election, as shown to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub description: Option<String>,
    pub status: ElectionStatus,
    #[serde(flatten)]
    pub dates: ElectionDates,
    pub max_recommendations: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            dates: election.dates(),
            name: election.name,
            description: election.description,
            status: election.status,
            max_recommendations: election.max_recommendations,
            is_active: election.is_active,
            created_at: election.created_at,
        }
    }
}
