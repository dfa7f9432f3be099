use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::{to_bson, Bson};
use rocket::form::{self, FromFormField, ValueField};
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
///
/// Elections only ever move forwards through
/// `Planning -> Recommend -> CandidateConfirm -> Voting -> Closed`,
/// or side-exit to `Cancelled` from any non-terminal state.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    /// Being set up by admins.
    Planning,
    /// Members may recommend nominees.
    Recommend,
    /// Invited nominees accept or decline their candidacy.
    CandidateConfirm,
    /// Members may vote for accepted candidates.
    Voting,
    /// Voting finished; results are visible.
    Closed,
    /// Abandoned before completion.
    Cancelled,
}

impl ElectionStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ElectionStatus; 6] = [
        ElectionStatus::Planning,
        ElectionStatus::Recommend,
        ElectionStatus::CandidateConfirm,
        ElectionStatus::Voting,
        ElectionStatus::Closed,
        ElectionStatus::Cancelled,
    ];

    /// The statuses an election in this status may move to.
    pub fn successors(self) -> &'static [ElectionStatus] {
        use ElectionStatus::*;
        match self {
            Planning => &[Recommend, Cancelled],
            Recommend => &[CandidateConfirm, Cancelled],
            CandidateConfirm => &[Voting, Cancelled],
            Voting => &[Closed, Cancelled],
            Closed | Cancelled => &[],
        }
    }

    /// Can an election move directly from this status to `target`?
    pub fn can_transition_to(self, target: ElectionStatus) -> bool {
        self.successors().contains(&target)
    }

    /// Is this an end state?
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Position in the lifecycle, used to check that transitions only advance.
    /// `Cancelled` ranks after everything.
    pub fn rank(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .expect("ALL contains every status")
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElectionStatus::Planning => "PLANNING",
            ElectionStatus::Recommend => "RECOMMEND",
            ElectionStatus::CandidateConfirm => "CANDIDATE_CONFIRM",
            ElectionStatus::Voting => "VOTING",
            ElectionStatus::Closed => "CLOSED",
            ElectionStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ElectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("unknown election status `{s}`"))
    }
}

/// Allows filtering by status in query strings, e.g. `?status=VOTING`.
impl<'v> FromFormField<'v> for ElectionStatus {
    fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
        field
            .value
            .parse()
            .map_err(|e: String| form::Error::validation(e).into())
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
