use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rocket::tokio::sync::{Mutex, OwnedMutexGuard};

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

use super::{
    CandidateRepo, ElectionFilter, ElectionRepo, Insert, Page, RecommendationRepo, Store,
    Transaction, UserDirectory, VoteRepo,
};

/// Every table of the in-memory store. Maps keyed by `Id` iterate in
/// creation order.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Id, User>,
    elections: BTreeMap<Id, Election>,
    candidates: BTreeMap<Id, Candidate>,
    recommendations: BTreeMap<Id, Recommendation>,
    votes: BTreeMap<Id, Vote>,
}

/// A store held entirely in process memory.
///
/// Transactions take an exclusive lock for their whole lifetime and work on
/// a private copy of the tables, so they are fully serialisable. Used for
/// tests and for embedding the engines without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user in the directory.
    pub async fn put_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Every stored vote, in creation order.
    pub async fn votes(&self) -> Vec<Vote> {
        self.tables.lock().await.votes.values().cloned().collect()
    }

    /// Every stored candidate, in creation order.
    pub async fn candidates(&self) -> Vec<Candidate> {
        self.tables.lock().await.candidates.values().cloned().collect()
    }

    /// Every stored recommendation, in creation order.
    pub async fn recommendations(&self) -> Vec<Recommendation> {
        self.tables
            .lock()
            .await
            .recommendations
            .values()
            .cloned()
            .collect()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTransaction { committed, working }))
    }
}

/// A transaction over the in-memory store.
struct MemoryTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[rocket::async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            mut committed,
            working,
        } = *self;
        *committed = working;
        Ok(())
    }
}

#[rocket::async_trait]
impl ElectionRepo for MemoryTransaction {
    async fn find_election(&mut self, id: Id) -> Result<Option<Election>> {
        Ok(self.working.elections.get(&id).cloned())
    }

    async fn list_elections(
        &mut self,
        filter: &ElectionFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Page<Election>> {
        let mut matching: Vec<_> = self
            .working
            .elections
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn insert_election(&mut self, election: &Election) -> Result<()> {
        self.working
            .elections
            .insert(election.id, election.clone());
        Ok(())
    }

    async fn replace_election_details(&mut self, election: &Election) -> Result<()> {
        if let Some(stored) = self.working.elections.get_mut(&election.id) {
            let status = stored.status;
            *stored = election.clone();
            stored.status = status;
        }
        Ok(())
    }

    async fn update_election_status(
        &mut self,
        id: Id,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool> {
        match self.working.elections.get_mut(&id) {
            Some(election) if election.status == from => {
                election.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl UserDirectory for MemoryTransaction {
    async fn find_user(&mut self, id: Id) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn count_active_users(&mut self) -> Result<u64> {
        Ok(self.working.users.values().filter(|u| u.is_active).count() as u64)
    }
}

#[rocket::async_trait]
impl CandidateRepo for MemoryTransaction {
    async fn find_candidate(&mut self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.working.candidates.get(&id).cloned())
    }

    async fn get_or_create_candidate(&mut self, key: CandidateKey) -> Result<Candidate> {
        let existing = self
            .working
            .candidates
            .values()
            .find(|c| c.key() == key)
            .cloned();
        Ok(match existing {
            Some(candidate) => candidate,
            None => {
                let candidate = Candidate::pending(key);
                self.working
                    .candidates
                    .insert(candidate.id, candidate.clone());
                candidate
            }
        })
    }

    async fn candidates_for_election(&mut self, election_id: Id) -> Result<Vec<Candidate>> {
        Ok(self
            .working
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn update_candidate_status(
        &mut self,
        id: Id,
        from: CandidateStatus,
        to: CandidateStatus,
        statement: Option<String>,
    ) -> Result<bool> {
        match self.working.candidates.get_mut(&id) {
            Some(candidate) if candidate.status == from => {
                candidate.status = to;
                if statement.is_some() {
                    candidate.statement = statement;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_vote_count(&mut self, id: Id) -> Result<()> {
        if let Some(candidate) = self.working.candidates.get_mut(&id) {
            candidate.vote_count += 1;
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl RecommendationRepo for MemoryTransaction {
    async fn find_recommendation(
        &mut self,
        election_id: Id,
        recommender_id: Id,
        for_role: Role,
    ) -> Result<Option<Recommendation>> {
        Ok(self
            .working
            .recommendations
            .values()
            .find(|r| {
                r.election_id == election_id
                    && r.recommender_id == recommender_id
                    && r.for_role == for_role
            })
            .cloned())
    }

    async fn lock_recommender(&mut self, _election_id: Id, _recommender_id: Id) -> Result<()> {
        // Transactions already hold the whole store exclusively.
        Ok(())
    }

    async fn count_recommendations_by(
        &mut self,
        election_id: Id,
        recommender_id: Id,
    ) -> Result<u64> {
        Ok(self
            .working
            .recommendations
            .values()
            .filter(|r| r.election_id == election_id && r.recommender_id == recommender_id)
            .count() as u64)
    }

    async fn insert_recommendation(&mut self, recommendation: &Recommendation) -> Result<Insert> {
        let duplicate = self.working.recommendations.values().any(|r| {
            r.election_id == recommendation.election_id
                && r.recommender_id == recommendation.recommender_id
                && r.for_role == recommendation.for_role
        });
        if duplicate {
            return Ok(Insert::Duplicate);
        }
        self.working
            .recommendations
            .insert(recommendation.id, recommendation.clone());
        Ok(Insert::Inserted)
    }

    async fn recommendations_for_election(
        &mut self,
        election_id: Id,
    ) -> Result<Vec<Recommendation>> {
        let mut recommendations: Vec<_> = self
            .working
            .recommendations
            .values()
            .filter(|r| r.election_id == election_id)
            .cloned()
            .collect();
        recommendations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(recommendations)
    }
}

#[rocket::async_trait]
impl VoteRepo for MemoryTransaction {
    async fn votes_by_voter(&mut self, election_id: Id, voter_id: Id) -> Result<Vec<Vote>> {
        Ok(self
            .working
            .votes
            .values()
            .filter(|v| v.election_id == election_id && v.voter_id == voter_id)
            .cloned()
            .collect())
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<Insert> {
        let duplicate = self.working.votes.values().any(|v| {
            v.election_id == vote.election_id
                && v.voter_id == vote.voter_id
                && v.for_role == vote.for_role
        });
        if duplicate {
            return Ok(Insert::Duplicate);
        }
        self.working.votes.insert(vote.id, vote.clone());
        Ok(Insert::Inserted)
    }

    async fn votes_for_election(&mut self, election_id: Id) -> Result<Vec<Vote>> {
        Ok(self
            .working
            .votes
            .values()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }
}
