use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Error, Result};
use crate::model::{
    api::recommendation::{
        CandidateRecommendations, RecommendationSpec, RecommendationStats, RoleRecommendations,
    },
    common::{election::ElectionStatus, role::Role},
    db::{candidate::CandidateKey, recommendation::Recommendation},
    mongodb::Id,
};
use crate::store::{
    retry_transient, CandidateRepo, ElectionRepo, Insert, RecommendationRepo, Store, UserDirectory,
};

/// How many comments are sampled per candidate in the statistics.
const COMMENT_SAMPLE: usize = 5;

/// Takes members' nominations during the `RECOMMEND` phase.
pub struct RecommendationEngine {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Record `recommender_id`'s recommendation, nominating the candidate
    /// user for the role if nobody has yet.
    pub async fn recommend(
        &self,
        election_id: Id,
        recommender_id: Id,
        spec: &RecommendationSpec,
    ) -> Result<Recommendation> {
        let recommendation = retry_transient(move || {
            self.recommend_once(election_id, recommender_id, spec)
        })
        .await?;

        info!(
            "Recommendation {} for {} in election {election_id}",
            recommendation.id, recommendation.for_role
        );
        self.audit.record(&AuditEvent::RecommendationCreated {
            election_id,
            recommender_id,
            candidate_id: recommendation.candidate_id,
            for_role: recommendation.for_role,
        });
        Ok(recommendation)
    }

    async fn recommend_once(
        &self,
        election_id: Id,
        recommender_id: Id,
        spec: &RecommendationSpec,
    ) -> Result<Recommendation> {
        let mut txn = self.store.begin().await?;
        let election = txn
            .find_election(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        if election.status != ElectionStatus::Recommend {
            return Err(Error::NotInRecommendationPeriod);
        }

        let nominee_id: Id = spec.candidate_user_id.into();
        if nominee_id == recommender_id {
            return Err(Error::SelfRecommendationNotAllowed);
        }
        let nominee = txn
            .find_user(nominee_id)
            .await?
            .ok_or(Error::UserNotFound(nominee_id))?;
        if !nominee.is_active {
            return Err(Error::UserInactive(nominee_id));
        }

        // Rolled back with everything else if any check below fails.
        let candidate = txn
            .get_or_create_candidate(CandidateKey {
                user_id: nominee_id,
                election_id,
                for_role: spec.for_role,
            })
            .await?;

        if txn
            .find_recommendation(election_id, recommender_id, spec.for_role)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateRecommendationForRole(spec.for_role));
        }

        txn.lock_recommender(election_id, recommender_id).await?;
        let held = txn
            .count_recommendations_by(election_id, recommender_id)
            .await?;
        if held >= u64::from(election.max_recommendations) {
            return Err(Error::RecommendationLimitExceeded(
                election.max_recommendations,
            ));
        }

        let recommendation = Recommendation {
            id: Id::new(),
            election_id,
            recommender_id,
            candidate_id: candidate.id,
            for_role: spec.for_role,
            comment: spec.comment(),
            created_at: Utc::now(),
        };
        if txn.insert_recommendation(&recommendation).await? == Insert::Duplicate {
            return Err(Error::DuplicateRecommendationForRole(spec.for_role));
        }
        txn.commit().await?;
        Ok(recommendation)
    }

    /// Recommendation counts per role and candidate.
    pub async fn stats(&self, election_id: Id) -> Result<RecommendationStats> {
        retry_transient(move || self.stats_once(election_id)).await
    }

    async fn stats_once(&self, election_id: Id) -> Result<RecommendationStats> {
        let mut txn = self.store.begin().await?;
        if txn.find_election(election_id).await?.is_none() {
            return Err(Error::ElectionNotFound(election_id));
        }
        let nominees: HashMap<Id, Id> = txn
            .candidates_for_election(election_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c.user_id))
            .collect();

        // Newest first, so the comment sample is the most recent.
        let mut by_role: BTreeMap<Role, BTreeMap<Id, CandidateRecommendations>> = BTreeMap::new();
        let mut total = 0;
        for recommendation in txn.recommendations_for_election(election_id).await? {
            let Some(&user_id) = nominees.get(&recommendation.candidate_id) else {
                warn!(
                    "Recommendation {} refers to missing candidate {}",
                    recommendation.id, recommendation.candidate_id
                );
                continue;
            };
            let entry = by_role
                .entry(recommendation.for_role)
                .or_default()
                .entry(recommendation.candidate_id)
                .or_insert_with(|| CandidateRecommendations {
                    candidate_id: recommendation.candidate_id.into(),
                    user_id: user_id.into(),
                    count: 0,
                    comments: Vec::new(),
                });
            entry.count += 1;
            total += 1;
            if let Some(comment) = recommendation.comment {
                if entry.comments.len() < COMMENT_SAMPLE {
                    entry.comments.push(comment);
                }
            }
        }

        let roles = by_role
            .into_iter()
            .map(|(role, candidates)| {
                // Already in candidate id order; the sort is stable.
                let mut candidates: Vec<_> = candidates.into_values().collect();
                candidates.sort_by(|a, b| b.count.cmp(&a.count));
                RoleRecommendations {
                    role,
                    total: candidates.iter().map(|c| c.count).sum(),
                    candidates,
                }
            })
            .collect();

        Ok(RecommendationStats {
            election_id: election_id.into(),
            total,
            roles,
        })
    }
}
