use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The two date windows of an election: recommendations, then voting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDates {
    pub recommendation_start: DateTime<Utc>,
    pub recommendation_end: DateTime<Utc>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
}

impl ElectionDates {
    /// Check the full schedule: each window is non-empty, and voting opens
    /// strictly after recommendations close.
    pub fn check_schedule(&self) -> Result<()> {
        self.check_recommendation_window()?;
        self.check_voting_window()?;
        if self.voting_start <= self.recommendation_end {
            return Err(Error::InvalidDateRange(
                "voting must start after recommendations end".to_string(),
            ));
        }
        Ok(())
    }

    /// The recommendation window must start before it ends.
    pub fn check_recommendation_window(&self) -> Result<()> {
        if self.recommendation_start >= self.recommendation_end {
            return Err(Error::InvalidDateRange(
                "recommendation start must be before recommendation end".to_string(),
            ));
        }
        Ok(())
    }

    /// The voting window must start before it ends, and cannot start
    /// before recommendations close.
    pub fn check_voting_window(&self) -> Result<()> {
        if self.voting_start >= self.voting_end {
            return Err(Error::InvalidDateRange(
                "voting start must be before voting end".to_string(),
            ));
        }
        if self.voting_start < self.recommendation_end {
            return Err(Error::InvalidDateRange(
                "voting cannot start before recommendations end".to_string(),
            ));
        }
        Ok(())
    }

    /// Is `now` inside the inclusive voting window?
    pub fn voting_open_at(&self, now: DateTime<Utc>) -> bool {
        self.voting_start <= now && now <= self.voting_end
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionDates {
        /// Recommendations open now; voting a fortnight later.
        pub fn future_example() -> Self {
            let now = Utc::now();
            Self {
                recommendation_start: now,
                recommendation_end: now + Duration::days(7),
                voting_start: now + Duration::days(14),
                voting_end: now + Duration::days(21),
            }
        }

        /// Recommendations closed last week; voting is open right now.
        pub fn current_example() -> Self {
            let now = Utc::now();
            Self {
                recommendation_start: now - Duration::days(14),
                recommendation_end: now - Duration::days(7),
                voting_start: now - Duration::days(1),
                voting_end: now + Duration::days(1),
            }
        }
    }
}
