//! Fire-and-forget audit trail.
//!
//! Sinks must never fail the operation being audited, so `record` returns
//! nothing and implementations swallow their own errors.

use std::fmt::{Display, Formatter};

use crate::model::{
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    mongodb::Id,
};

/// Log target that audit lines are written under.
pub const AUDIT_TARGET: &str = "audit";

/// Something that happened to an election worth keeping a record of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    ElectionCreated {
        election_id: Id,
    },
    ElectionStatusChanged {
        election_id: Id,
        from: ElectionStatus,
        to: ElectionStatus,
    },
    RecommendationCreated {
        election_id: Id,
        recommender_id: Id,
        candidate_id: Id,
        for_role: Role,
    },
    CandidatesInvited {
        election_id: Id,
        for_role: Role,
        candidate_ids: Vec<Id>,
    },
    CandidateResponded {
        candidate_id: Id,
        status: CandidateStatus,
    },
    CandidateWithdrew {
        candidate_id: Id,
    },
    /// Only the roles are recorded; who a voter chose is never audited.
    VotesCast {
        election_id: Id,
        voter_id: Id,
        roles: Vec<Role>,
    },
}

impl Display for AuditEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEvent::ElectionCreated { election_id } => {
                write!(f, "election_created election={election_id}")
            }
            AuditEvent::ElectionStatusChanged {
                election_id,
                from,
                to,
            } => write!(
                f,
                "election_status_changed election={election_id} from={from} to={to}"
            ),
            AuditEvent::RecommendationCreated {
                election_id,
                recommender_id,
                candidate_id,
                for_role,
            } => write!(
                f,
                "recommendation_created election={election_id} recommender={recommender_id} \
                 candidate={candidate_id} role={for_role}"
            ),
            AuditEvent::CandidatesInvited {
                election_id,
                for_role,
                candidate_ids,
            } => {
                let ids: Vec<_> = candidate_ids.iter().map(Id::to_string).collect();
                write!(
                    f,
                    "candidates_invited election={election_id} role={for_role} candidates=[{}]",
                    ids.join(",")
                )
            }
            AuditEvent::CandidateResponded {
                candidate_id,
                status,
            } => write!(
                f,
                "candidate_responded candidate={candidate_id} status={status}"
            ),
            AuditEvent::CandidateWithdrew { candidate_id } => {
                write!(f, "candidate_withdrew candidate={candidate_id}")
            }
            AuditEvent::VotesCast {
                election_id,
                voter_id,
                roles,
            } => {
                let roles: Vec<_> = roles.iter().map(|r| r.as_str()).collect();
                write!(
                    f,
                    "votes_cast election={election_id} voter={voter_id} roles=[{}]",
                    roles.join(",")
                )
            }
        }
    }
}

/// Somewhere to send audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes each event as one line to the [`AUDIT_TARGET`] log target.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        info!(target: AUDIT_TARGET, "{event}");
    }
}

/// Example sinks for tests.
#[cfg(test)]
mod examples {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every event in memory.
    #[derive(Debug, Default)]
    pub struct RecordingSink(Mutex<Vec<AuditEvent>>);

    impl RecordingSink {
        pub fn events(&self) -> Vec<AuditEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }
}

#[cfg(test)]
pub use examples::RecordingSink;
