use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionSpec, ElectionUpdate},
    common::election::ElectionStatus,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{retry_transient, ElectionFilter, ElectionRepo, Page, Store, Transaction};

/// Owns election records and their lifecycle.
pub struct ElectionRegistry {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
}

impl ElectionRegistry {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Create a new election in `PLANNING`.
    pub async fn create(&self, spec: ElectionSpec) -> Result<Election> {
        spec.dates.check_schedule()?;
        check_max_recommendations(spec.max_recommendations)?;
        let name = check_name(&spec.name)?;
        let description = spec.description.as_deref().and_then(non_blank);

        let election = Election::new(name, description, spec.dates, spec.max_recommendations);
        let new = &election;
        retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            txn.insert_election(new).await?;
            txn.commit().await
        })
        .await?;

        info!("Created election {} ({})", election.id, election.name);
        self.audit.record(&AuditEvent::ElectionCreated {
            election_id: election.id,
        });
        Ok(election)
    }

    pub async fn get(&self, id: Id) -> Result<Election> {
        retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            txn.find_election(id)
                .await?
                .ok_or(Error::ElectionNotFound(id))
        })
        .await
    }

    /// Matching elections, newest first.
    pub async fn list(
        &self,
        filter: &ElectionFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Page<Election>> {
        retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            txn.list_elections(filter, skip, limit).await
        })
        .await
    }

    /// Move an election to `target`, if the lifecycle and its dates allow.
    pub async fn transition(&self, id: Id, target: ElectionStatus) -> Result<Election> {
        let (from, election) =
            retry_transient(move || self.transition_once(id, target)).await?;

        info!("Election {id} moved from {from} to {target}");
        self.audit.record(&AuditEvent::ElectionStatusChanged {
            election_id: id,
            from,
            to: target,
        });
        Ok(election)
    }

    async fn transition_once(
        &self,
        id: Id,
        target: ElectionStatus,
    ) -> Result<(ElectionStatus, Election)> {
        let mut txn = self.store.begin().await?;
        let mut election = txn
            .find_election(id)
            .await?
            .ok_or(Error::ElectionNotFound(id))?;

        let from = election.status;
        if !from.can_transition_to(target) {
            return Err(Error::InvalidStatusTransition { from, to: target });
        }
        match target {
            ElectionStatus::Recommend => election.dates().check_recommendation_window()?,
            ElectionStatus::Voting => election.dates().check_voting_window()?,
            _ => {}
        }

        // Someone else moved it first.
        if !txn.update_election_status(id, from, target).await? {
            return Err(Error::InvalidStatusTransition { from, to: target });
        }
        txn.commit().await?;

        election.status = target;
        Ok((from, election))
    }

    /// Apply a partial update to an unfinished election.
    pub async fn update(&self, id: Id, changes: &ElectionUpdate) -> Result<Election> {
        if let Some(max) = changes.max_recommendations {
            check_max_recommendations(max)?;
        }
        let name = changes.name.as_deref().map(check_name).transpose()?;
        let name = name.as_ref();

        let election = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            let mut election = txn
                .find_election(id)
                .await?
                .ok_or(Error::ElectionNotFound(id))?;
            if election.status.is_terminal() {
                return Err(Error::ElectionFinished(election.status));
            }

            let dates = changes.merge_dates(election.dates());
            dates.check_schedule()?;
            election.set_dates(dates);
            if let Some(name) = name {
                election.name = name.clone();
            }
            if let Some(description) = &changes.description {
                election.description = non_blank(description);
            }
            if let Some(max) = changes.max_recommendations {
                election.max_recommendations = max;
            }

            txn.replace_election_details(&election).await?;
            txn.commit().await?;
            Ok(election)
        })
        .await?;

        info!("Updated election {id}");
        Ok(election)
    }

    /// Soft-disable or re-enable an election.
    pub async fn set_active(&self, id: Id, is_active: bool) -> Result<Election> {
        let election = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            let mut election = txn
                .find_election(id)
                .await?
                .ok_or(Error::ElectionNotFound(id))?;
            election.is_active = is_active;
            txn.replace_election_details(&election).await?;
            txn.commit().await?;
            Ok(election)
        })
        .await?;

        info!("Election {id} is_active={is_active}");
        Ok(election)
    }
}

fn check_max_recommendations(max: u32) -> Result<()> {
    if max < 1 {
        return Err(Error::BadRequest(
            "maxRecommendations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<String> {
    non_blank(name).ok_or_else(|| Error::BadRequest("election name must not be blank".to_string()))
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::audit::AuditEvent;
    use crate::model::common::election::ElectionDates;
    use crate::service::harness::Harness;

    #[rocket::async_test]
    async fn create_starts_in_planning() {
        let h = Harness::new();
        let election = h
            .registry
            .create(ElectionSpec::future_example())
            .await
            .unwrap();
        assert_eq!(election.status, ElectionStatus::Planning);
        assert!(election.is_active);
        assert_eq!(h.registry.get(election.id).await.unwrap(), election);
        assert_eq!(
            h.audit.events(),
            [AuditEvent::ElectionCreated {
                election_id: election.id
            }]
        );
    }

    #[rocket::async_test]
    async fn create_validates_dates() {
        let h = Harness::new();

        // Voting must start strictly after recommendations end.
        let mut spec = ElectionSpec::future_example();
        spec.dates.voting_start = spec.dates.recommendation_end;
        assert!(matches!(
            h.registry.create(spec).await,
            Err(Error::InvalidDateRange(_))
        ));

        let mut spec = ElectionSpec::future_example();
        spec.dates.recommendation_end = spec.dates.recommendation_start - Duration::days(1);
        assert!(matches!(
            h.registry.create(spec).await,
            Err(Error::InvalidDateRange(_))
        ));
    }

    #[rocket::async_test]
    async fn create_requires_a_recommendation_allowance() {
        let h = Harness::new();
        let mut spec = ElectionSpec::future_example();
        spec.max_recommendations = 0;
        assert!(matches!(
            h.registry.create(spec).await,
            Err(Error::BadRequest(_))
        ));

        let mut spec = ElectionSpec::future_example();
        spec.name = "  ".to_string();
        assert!(matches!(
            h.registry.create(spec).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[rocket::async_test]
    async fn unknown_elections_are_not_found() {
        let h = Harness::new();
        let id = Id::new();
        assert!(matches!(h.registry.get(id).await, Err(Error::ElectionNotFound(i)) if i == id));
        assert!(matches!(
            h.registry.transition(id, ElectionStatus::Recommend).await,
            Err(Error::ElectionNotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn every_transition_pair_follows_the_table() {
        for from in ElectionStatus::ALL {
            for to in ElectionStatus::ALL {
                let h = Harness::new();
                let election = h
                    .election(ElectionSpec::current_example(), from)
                    .await;
                let result = h.registry.transition(election.id, to).await;
                let stored = h.registry.get(election.id).await.unwrap();
                if from.can_transition_to(to) {
                    assert_eq!(result.unwrap().status, to, "{from} -> {to}");
                    assert_eq!(stored.status, to);
                } else {
                    assert!(
                        matches!(result, Err(Error::InvalidStatusTransition { .. })),
                        "{from} -> {to} should be rejected"
                    );
                    assert_eq!(stored.status, from);
                }
            }
        }
    }

    #[rocket::async_test]
    async fn voting_cannot_overlap_recommendations() {
        let h = Harness::new();
        let election = h
            .election(
                ElectionSpec::future_example(),
                ElectionStatus::CandidateConfirm,
            )
            .await;

        // Dates can be broken behind the registry's back, e.g. by migration.
        let mut broken = election.clone();
        broken.voting_start = broken.recommendation_end - Duration::hours(1);
        {
            let mut txn = Store::begin(&h.store).await.unwrap();
            txn.replace_election_details(&broken).await.unwrap();
            txn.commit().await.unwrap();
        }

        assert!(matches!(
            h.registry
                .transition(election.id, ElectionStatus::Voting)
                .await,
            Err(Error::InvalidDateRange(_))
        ));
        assert_eq!(
            h.registry.get(election.id).await.unwrap().status,
            ElectionStatus::CandidateConfirm
        );
    }

    #[rocket::async_test]
    async fn transitions_are_audited() {
        let h = Harness::new();
        let election = h
            .election(ElectionSpec::future_example(), ElectionStatus::Recommend)
            .await;
        assert!(h.audit.events().contains(&AuditEvent::ElectionStatusChanged {
            election_id: election.id,
            from: ElectionStatus::Planning,
            to: ElectionStatus::Recommend,
        }));
    }

    #[rocket::async_test]
    async fn concurrent_transitions_have_one_winner() {
        let h = Harness::new();
        let election = h
            .registry
            .create(ElectionSpec::future_example())
            .await
            .unwrap();
        let election_id = election.id;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = h.registry.clone();
                rocket::tokio::spawn(async move {
                    registry
                        .transition(election_id, ElectionStatus::Recommend)
                        .await
                })
            })
            .collect();
        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::InvalidStatusTransition { from, .. }) => {
                    assert_eq!(from, ElectionStatus::Recommend)
                }
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[rocket::async_test]
    async fn update_merges_and_revalidates() {
        let h = Harness::new();
        let election = h
            .registry
            .create(ElectionSpec::future_example())
            .await
            .unwrap();

        let changes = ElectionUpdate {
            name: Some("Renamed".to_string()),
            description: Some(" ".to_string()),
            voting_end: Some(election.voting_end + Duration::days(2)),
            max_recommendations: Some(5),
            ..Default::default()
        };
        let updated = h.registry.update(election.id, &changes).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, None);
        assert_eq!(updated.voting_end, election.voting_end + Duration::days(2));
        assert_eq!(updated.voting_start, election.voting_start);
        assert_eq!(updated.max_recommendations, 5);
        assert_eq!(updated.status, ElectionStatus::Planning);

        let overlapping = ElectionUpdate {
            voting_start: Some(election.recommendation_start),
            ..Default::default()
        };
        assert!(matches!(
            h.registry.update(election.id, &overlapping).await,
            Err(Error::InvalidDateRange(_))
        ));
    }

    #[rocket::async_test]
    async fn finished_elections_cannot_be_updated() {
        let h = Harness::new();
        for status in [ElectionStatus::Closed, ElectionStatus::Cancelled] {
            let election = h
                .election(ElectionSpec::current_example(), status)
                .await;
            let changes = ElectionUpdate {
                name: Some("Too late".to_string()),
                ..Default::default()
            };
            assert!(matches!(
                h.registry.update(election.id, &changes).await,
                Err(Error::ElectionFinished(s)) if s == status
            ));
        }
    }

    #[rocket::async_test]
    async fn list_hides_inactive_and_filters_by_status() {
        let h = Harness::new();
        let planning = h
            .registry
            .create(ElectionSpec::future_example())
            .await
            .unwrap();
        let recommending = h
            .election(ElectionSpec::future_example(), ElectionStatus::Recommend)
            .await;
        let hidden = h
            .registry
            .create(ElectionSpec::future_example())
            .await
            .unwrap();
        h.registry.set_active(hidden.id, false).await.unwrap();

        let all = h
            .registry
            .list(&ElectionFilter::default(), 0, 50)
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        // Newest first.
        let ids: Vec<_> = all.items.iter().map(|e| e.id).collect();
        assert_eq!(ids, [recommending.id, planning.id]);

        let filter = ElectionFilter {
            status: Some(ElectionStatus::Recommend),
            include_inactive: false,
        };
        let page = h.registry.list(&filter, 0, 50).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, recommending.id);

        let paged = h
            .registry
            .list(&ElectionFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(paged.total, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].id, planning.id);

        h.registry.set_active(hidden.id, true).await.unwrap();
        let all = h
            .registry
            .list(&ElectionFilter::default(), 0, 50)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
    }

    #[rocket::async_test]
    async fn dates_example_is_used_verbatim() {
        let h = Harness::new();
        let dates = ElectionDates::future_example();
        let spec = ElectionSpec {
            dates,
            ..ElectionSpec::future_example()
        };
        let election = h.registry.create(spec).await.unwrap();
        assert_eq!(election.dates(), dates);
    }
}
