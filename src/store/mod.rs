//! Storage for the election core.
//!
//! Each entity has a repository trait. A [`Transaction`] implements all of
//! them over a single unit of work: nothing written through it is visible to
//! anyone else until [`Transaction::commit`] succeeds, and dropping it
//! without committing discards everything.
//!
//! Implementations must enforce the composite unique keys themselves
//! (candidates per user/election/role, recommendations per
//! election/recommender/role, votes per election/voter/role) and report
//! violations as [`Insert::Duplicate`] rather than as errors.

use std::future::Future;

use crate::error::Result;
use crate::model::{
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    db::{
        candidate::{Candidate, CandidateKey},
        election::Election,
        recommendation::Recommendation,
        user::User,
        vote::Vote,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// How many times a unit of work is re-run after a transient conflict.
const MAX_ATTEMPTS: usize = 5;

/// The outcome of inserting a row guarded by a unique key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub enum Insert {
    Inserted,
    /// A row with the same unique key already exists; nothing was written.
    Duplicate,
}

/// Which elections to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionFilter {
    /// Only elections in this status.
    pub status: Option<ElectionStatus>,
    /// Include soft-disabled elections.
    pub include_inactive: bool,
}

impl ElectionFilter {
    pub fn matches(&self, election: &Election) -> bool {
        (self.include_inactive || election.is_active)
            && self.status.map_or(true, |s| s == election.status)
    }
}

/// A page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[rocket::async_trait]
pub trait ElectionRepo {
    async fn find_election(&mut self, id: Id) -> Result<Option<Election>>;

    /// Matching elections, newest first.
    async fn list_elections(
        &mut self,
        filter: &ElectionFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Page<Election>>;

    async fn insert_election(&mut self, election: &Election) -> Result<()>;

    /// Replace every field except the status.
    async fn replace_election_details(&mut self, election: &Election) -> Result<()>;

    /// Atomically set the status to `to` iff it is currently `from`.
    /// Returns whether the update happened.
    async fn update_election_status(
        &mut self,
        id: Id,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool>;
}

#[rocket::async_trait]
pub trait UserDirectory {
    async fn find_user(&mut self, id: Id) -> Result<Option<User>>;

    async fn count_active_users(&mut self) -> Result<u64>;
}

#[rocket::async_trait]
pub trait CandidateRepo {
    async fn find_candidate(&mut self, id: Id) -> Result<Option<Candidate>>;

    /// Return the candidate with the given key, creating a `Pending` one if
    /// none exists. An existing candidate is returned unchanged, so calling
    /// this repeatedly for the same key always yields the same row.
    async fn get_or_create_candidate(&mut self, key: CandidateKey) -> Result<Candidate>;

    /// All candidates in the election, in creation order.
    async fn candidates_for_election(&mut self, election_id: Id) -> Result<Vec<Candidate>>;

    /// Atomically move the candidate from `from` to `to`, replacing the
    /// statement if one is given. Returns whether the update happened.
    async fn update_candidate_status(
        &mut self,
        id: Id,
        from: CandidateStatus,
        to: CandidateStatus,
        statement: Option<String>,
    ) -> Result<bool>;

    async fn increment_vote_count(&mut self, id: Id) -> Result<()>;
}

#[rocket::async_trait]
pub trait RecommendationRepo {
    async fn find_recommendation(
        &mut self,
        election_id: Id,
        recommender_id: Id,
        for_role: Role,
    ) -> Result<Option<Recommendation>>;

    /// Serialise this recommender's concurrent transactions for this election.
    async fn lock_recommender(&mut self, election_id: Id, recommender_id: Id) -> Result<()>;

    async fn count_recommendations_by(&mut self, election_id: Id, recommender_id: Id)
        -> Result<u64>;

    async fn insert_recommendation(&mut self, recommendation: &Recommendation) -> Result<Insert>;

    /// All recommendations in the election, newest first.
    async fn recommendations_for_election(&mut self, election_id: Id)
        -> Result<Vec<Recommendation>>;
}

#[rocket::async_trait]
pub trait VoteRepo {
    /// The voter's ballots in the election.
    async fn votes_by_voter(&mut self, election_id: Id, voter_id: Id) -> Result<Vec<Vote>>;

    async fn insert_vote(&mut self, vote: &Vote) -> Result<Insert>;

    async fn votes_for_election(&mut self, election_id: Id) -> Result<Vec<Vote>>;
}

/// A unit of work spanning every repository.
#[rocket::async_trait]
pub trait Transaction:
    ElectionRepo + UserDirectory + CandidateRepo + RecommendationRepo + VoteRepo + Send
{
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// A handle on the backing store, shared by every engine.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Run a unit of work, re-running it from scratch if it fails with a
/// transient conflict. Each attempt must begin its own transaction.
///
/// Domain errors, including duplicates, are returned immediately.
pub async fn retry_transient<T, F, Fut>(mut unit_of_work: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match unit_of_work().await {
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                debug!("Transient storage conflict on attempt {attempt}, retrying: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;

    #[rocket::async_test]
    async fn transient_failures_are_retried() {
        let calls = &AtomicUsize::new(0);
        let result = retry_transient(move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::WriteConflict("test".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[rocket::async_test]
    async fn retries_are_bounded() {
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = retry_transient(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::WriteConflict("test".to_string()))
        })
        .await;
        assert!(matches!(result, Err(Error::WriteConflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[rocket::async_test]
    async fn domain_errors_are_not_retried() {
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = retry_transient(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::DuplicateVoteForRole(Role::President))
        })
        .await;
        assert!(matches!(result, Err(Error::DuplicateVoteForRole(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
