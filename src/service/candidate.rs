use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Error, Result};
use crate::model::{
    api::candidate::{CandidateReply, CandidateView, Decision, InvitationSpec},
    common::{candidate::CandidateStatus, election::ElectionStatus},
    db::{candidate::Candidate, election::Election},
    mongodb::Id,
};
use crate::store::{
    retry_transient, CandidateRepo, ElectionRepo, RecommendationRepo, Store, Transaction,
};

/// Moves nominees through invitation, acceptance and withdrawal.
pub struct CandidateDesk {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
}

/// Candidacies can only change while recommendations or confirmations are open.
fn check_candidate_period(election: &Election) -> Result<()> {
    match election.status {
        ElectionStatus::Recommend | ElectionStatus::CandidateConfirm => Ok(()),
        _ => Err(Error::NotInCandidatePeriod),
    }
}

impl CandidateDesk {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Candidates that can be voted for, by role then candidacy.
    pub async fn accepted(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let mut candidates = self.all(election_id).await?;
        candidates.retain(|c| c.status == CandidateStatus::Accepted);
        Ok(candidates)
    }

    /// Every candidate, by role then candidacy.
    pub async fn all(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let mut candidates = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            if txn.find_election(election_id).await?.is_none() {
                return Err(Error::ElectionNotFound(election_id));
            }
            txn.candidates_for_election(election_id).await
        })
        .await?;
        candidates.sort_by_key(|c| c.for_role);
        Ok(candidates)
    }

    /// Present candidates of one election with their recommendation counts.
    /// Vote counts stay hidden until the election closes.
    pub async fn views(
        &self,
        election_id: Id,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<CandidateView>> {
        let (status, counts) = self.standing(election_id).await?;
        Ok(candidates
            .into_iter()
            .map(|c| {
                let recommendations = counts.get(&c.id).copied().unwrap_or_default();
                CandidateView::new(c, recommendations, status)
            })
            .collect())
    }

    pub async fn view(&self, candidate: Candidate) -> Result<CandidateView> {
        let (status, counts) = self.standing(candidate.election_id).await?;
        let recommendations = counts.get(&candidate.id).copied().unwrap_or_default();
        Ok(CandidateView::new(candidate, recommendations, status))
    }

    /// The election's status and how often each candidate was recommended.
    async fn standing(&self, election_id: Id) -> Result<(ElectionStatus, HashMap<Id, u64>)> {
        retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            let election = txn
                .find_election(election_id)
                .await?
                .ok_or(Error::ElectionNotFound(election_id))?;
            let mut counts: HashMap<Id, u64> = HashMap::new();
            for recommendation in txn.recommendations_for_election(election_id).await? {
                *counts.entry(recommendation.candidate_id).or_default() += 1;
            }
            Ok((election.status, counts))
        })
        .await
    }

    /// Invite the most-recommended pending nominees for a role.
    ///
    /// Returns the newly invited candidates; nominees in the top `top_n`
    /// who were already invited (or further along) are left as they are.
    pub async fn invite(&self, election_id: Id, spec: InvitationSpec) -> Result<Vec<Candidate>> {
        if spec.top_n == 0 {
            return Err(Error::BadRequest("topN must be at least 1".to_string()));
        }
        let invited = retry_transient(move || self.invite_once(election_id, spec)).await?;

        info!(
            "Invited {} candidate(s) for {} in election {election_id}",
            invited.len(),
            spec.for_role
        );
        self.audit.record(&AuditEvent::CandidatesInvited {
            election_id,
            for_role: spec.for_role,
            candidate_ids: invited.iter().map(|c| c.id).collect(),
        });
        Ok(invited)
    }

    async fn invite_once(&self, election_id: Id, spec: InvitationSpec) -> Result<Vec<Candidate>> {
        let mut txn = self.store.begin().await?;
        let election = txn
            .find_election(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        check_candidate_period(&election)?;

        let mut counts: HashMap<Id, u64> = HashMap::new();
        for recommendation in txn.recommendations_for_election(election_id).await? {
            if recommendation.for_role == spec.for_role {
                *counts.entry(recommendation.candidate_id).or_default() += 1;
            }
        }
        if counts.is_empty() {
            return Err(Error::NoRecommendations(spec.for_role));
        }

        // Creation order, so the stable sort breaks ties by earliest candidacy.
        let mut ranked: Vec<_> = txn
            .candidates_for_election(election_id)
            .await?
            .into_iter()
            .filter(|c| c.for_role == spec.for_role && counts.contains_key(&c.id))
            .collect();
        ranked.sort_by_key(|c| std::cmp::Reverse(counts[&c.id]));

        let mut invited = Vec::new();
        for mut candidate in ranked.into_iter().take(spec.top_n) {
            if candidate.status != CandidateStatus::Pending {
                continue;
            }
            if txn
                .update_candidate_status(
                    candidate.id,
                    CandidateStatus::Pending,
                    CandidateStatus::Invited,
                    None,
                )
                .await?
            {
                candidate.status = CandidateStatus::Invited;
                invited.push(candidate);
            }
        }
        txn.commit().await?;
        Ok(invited)
    }

    /// The nominee accepts or declines their invitation.
    pub async fn respond(
        &self,
        candidate_id: Id,
        user_id: Id,
        reply: &CandidateReply,
    ) -> Result<Candidate> {
        let statement = match reply.decision {
            Decision::Accepted => reply
                .statement
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Decision::Declined => None,
        };
        let statement = statement.as_ref();
        let target = CandidateStatus::from(reply.decision);

        let candidate = retry_transient(move || async move {
            let (mut txn, candidate) = self.nominee_change(candidate_id, user_id).await?;
            if candidate.status != CandidateStatus::Invited {
                return Err(Error::InvalidCandidateStatus {
                    expected: CandidateStatus::Invited,
                    actual: candidate.status,
                });
            }
            let candidate =
                move_candidate(&mut *txn, candidate, target, statement.cloned()).await?;
            txn.commit().await?;
            Ok(candidate)
        })
        .await?;

        info!("Candidate {candidate_id} responded {target}");
        self.audit.record(&AuditEvent::CandidateResponded {
            candidate_id,
            status: target,
        });
        Ok(candidate)
    }

    /// The nominee stands down.
    pub async fn withdraw(&self, candidate_id: Id, user_id: Id) -> Result<Candidate> {
        let candidate = retry_transient(move || async move {
            let (mut txn, candidate) = self.nominee_change(candidate_id, user_id).await?;
            match candidate.status {
                CandidateStatus::Invited | CandidateStatus::Accepted => {}
                actual => {
                    return Err(Error::InvalidCandidateStatus {
                        expected: CandidateStatus::Accepted,
                        actual,
                    })
                }
            }
            let candidate =
                move_candidate(&mut *txn, candidate, CandidateStatus::Withdrawn, None).await?;
            txn.commit().await?;
            Ok(candidate)
        })
        .await?;

        info!("Candidate {candidate_id} withdrew");
        self.audit
            .record(&AuditEvent::CandidateWithdrew { candidate_id });
        Ok(candidate)
    }

    /// Begin a change the nominee makes to their own candidacy, checking the
    /// caller and the election phase.
    async fn nominee_change(
        &self,
        candidate_id: Id,
        user_id: Id,
    ) -> Result<(Box<dyn Transaction>, Candidate)> {
        let mut txn = self.store.begin().await?;
        let candidate = txn
            .find_candidate(candidate_id)
            .await?
            .ok_or(Error::CandidateNotFound(candidate_id))?;
        if candidate.user_id != user_id {
            return Err(Error::Forbidden(
                "only the nominee may change their candidacy".to_string(),
            ));
        }
        let election = txn
            .find_election(candidate.election_id)
            .await?
            .ok_or(Error::ElectionNotFound(candidate.election_id))?;
        check_candidate_period(&election)?;
        Ok((txn, candidate))
    }
}

/// Compare-and-set the candidate's status within `txn`.
async fn move_candidate(
    txn: &mut dyn Transaction,
    mut candidate: Candidate,
    to: CandidateStatus,
    statement: Option<String>,
) -> Result<Candidate> {
    if !txn
        .update_candidate_status(candidate.id, candidate.status, to, statement.clone())
        .await?
    {
        // Re-run to report against the status that won.
        return Err(Error::WriteConflict(format!(
            "candidate {} changed concurrently",
            candidate.id
        )));
    }
    candidate.status = to;
    if statement.is_some() {
        candidate.statement = statement;
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        api::{election::ElectionSpec, vote::BallotSpec},
        common::role::Role,
        db::user::User,
    };
    use crate::service::harness::Harness;

    fn accept(statement: &str) -> CandidateReply {
        CandidateReply {
            decision: Decision::Accepted,
            statement: Some(statement.to_string()),
        }
    }

    fn decline() -> CandidateReply {
        CandidateReply {
            decision: Decision::Declined,
            statement: Some("ignored".to_string()),
        }
    }

    /// Recommend each nominee `counts[i]` times for `role`.
    async fn nominate(h: &Harness, election_id: Id, role: Role, nominees: &[(&User, usize)]) {
        for (nominee, count) in nominees {
            for backer in h.members(*count).await {
                h.recommend(election_id, &backer, nominee, role)
                    .await
                    .unwrap();
            }
        }
    }

    #[rocket::async_test]
    async fn invite_takes_the_most_recommended() {
        let h = Harness::new();
        let election = h.recommending().await;
        let [a, b, c, d] = <[User; 4]>::try_from(h.members(4).await).unwrap();
        // `b` and `c` tie; `b` was nominated first.
        nominate(&h, election.id, Role::Treasurer, &[(&a, 1), (&b, 2), (&c, 2), (&d, 3)]).await;

        let invited = h
            .desk
            .invite(
                election.id,
                InvitationSpec {
                    for_role: Role::Treasurer,
                    top_n: 3,
                },
            )
            .await
            .unwrap();
        let users: Vec<_> = invited.iter().map(|c| c.user_id).collect();
        assert_eq!(users, [d.id, b.id, c.id]);
        assert!(invited.iter().all(|c| c.status == CandidateStatus::Invited));

        let pending: Vec<_> = h
            .desk
            .all(election.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.status == CandidateStatus::Pending)
            .map(|c| c.user_id)
            .collect();
        assert_eq!(pending, [a.id]);
    }

    #[rocket::async_test]
    async fn invite_leaves_other_statuses_alone() {
        let h = Harness::new();
        let election = h.recommending().await;
        let [a, b] = <[User; 2]>::try_from(h.members(2).await).unwrap();
        nominate(&h, election.id, Role::Secretary, &[(&a, 2), (&b, 1)]).await;

        let spec = InvitationSpec {
            for_role: Role::Secretary,
            top_n: 1,
        };
        let first = h.desk.invite(election.id, spec).await.unwrap();
        assert_eq!(first.len(), 1);
        h.desk
            .respond(first[0].id, a.id, &decline())
            .await
            .unwrap();

        // The declined nominee is still on top and is not re-invited.
        let again = h.desk.invite(election.id, spec).await.unwrap();
        assert!(again.is_empty());
        let declined = h.store.candidates().await;
        assert!(declined
            .iter()
            .any(|c| c.user_id == a.id && c.status == CandidateStatus::Declined));
    }

    #[rocket::async_test]
    async fn invite_requires_recommendations() {
        let h = Harness::new();
        let election = h.recommending().await;
        let spec = InvitationSpec {
            for_role: Role::Auditor,
            top_n: 3,
        };
        assert!(matches!(
            h.desk.invite(election.id, spec).await,
            Err(Error::NoRecommendations(Role::Auditor))
        ));
        assert!(matches!(
            h.desk
                .invite(election.id, InvitationSpec { top_n: 0, ..spec })
                .await,
            Err(Error::BadRequest(_))
        ));
    }

    #[rocket::async_test]
    async fn invite_only_while_candidacies_are_open() {
        let h = Harness::new();
        let spec = InvitationSpec {
            for_role: Role::President,
            top_n: 3,
        };
        for status in [
            ElectionStatus::Planning,
            ElectionStatus::Voting,
            ElectionStatus::Closed,
        ] {
            let election = h.election(ElectionSpec::current_example(), status).await;
            assert!(matches!(
                h.desk.invite(election.id, spec).await,
                Err(Error::NotInCandidatePeriod)
            ));
        }
    }

    #[rocket::async_test]
    async fn accepting_stores_the_statement() {
        let h = Harness::new();
        let election = h.recommending().await;
        let nominee = h.member().await;
        nominate(&h, election.id, Role::President, &[(&nominee, 1)]).await;
        let invited = h
            .desk
            .invite(
                election.id,
                InvitationSpec {
                    for_role: Role::President,
                    top_n: 1,
                },
            )
            .await
            .unwrap();
        h.advance(election.id, ElectionStatus::CandidateConfirm)
            .await;

        let accepted = h
            .desk
            .respond(invited[0].id, nominee.id, &accept("  I will serve  "))
            .await
            .unwrap();
        assert_eq!(accepted.status, CandidateStatus::Accepted);
        assert_eq!(accepted.statement.as_deref(), Some("I will serve"));

        let listed = h.desk.accepted(election.id).await.unwrap();
        assert_eq!(listed, [accepted]);
    }

    #[rocket::async_test]
    async fn only_the_nominee_may_respond() {
        let h = Harness::new();
        let election = h.recommending().await;
        let [nominee, impostor] = <[User; 2]>::try_from(h.members(2).await).unwrap();
        nominate(&h, election.id, Role::President, &[(&nominee, 1)]).await;
        let invited = h
            .desk
            .invite(
                election.id,
                InvitationSpec {
                    for_role: Role::President,
                    top_n: 1,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            h.desk.respond(invited[0].id, impostor.id, &accept("me")).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            h.desk.withdraw(invited[0].id, impostor.id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            h.desk.respond(Id::new(), nominee.id, &accept("me")).await,
            Err(Error::CandidateNotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn only_invited_candidates_respond() {
        let h = Harness::new();
        let election = h.recommending().await;
        let nominee = h.member().await;
        nominate(&h, election.id, Role::Auditor, &[(&nominee, 1)]).await;
        let pending = h.store.candidates().await.remove(0);

        assert!(matches!(
            h.desk.respond(pending.id, nominee.id, &accept("early")).await,
            Err(Error::InvalidCandidateStatus {
                expected: CandidateStatus::Invited,
                actual: CandidateStatus::Pending,
            })
        ));
        assert!(matches!(
            h.desk.withdraw(pending.id, nominee.id).await,
            Err(Error::InvalidCandidateStatus {
                actual: CandidateStatus::Pending,
                ..
            })
        ));
    }

    #[rocket::async_test]
    async fn accepted_candidates_may_withdraw() {
        let h = Harness::new();
        let election = h.recommending().await;
        let nominee = h.member().await;
        let candidate = h.stand(election.id, &nominee, Role::Secretary).await;

        let withdrawn = h.desk.withdraw(candidate.id, nominee.id).await.unwrap();
        assert_eq!(withdrawn.status, CandidateStatus::Withdrawn);
        assert!(h.desk.accepted(election.id).await.unwrap().is_empty());
        assert!(h
            .audit
            .events()
            .contains(&AuditEvent::CandidateWithdrew {
                candidate_id: candidate.id
            }));

        // Once voting starts, candidacies are frozen.
        let other = h.member().await;
        let standing = h.stand(election.id, &other, Role::Treasurer).await;
        h.advance(election.id, ElectionStatus::Voting).await;
        assert!(matches!(
            h.desk.withdraw(standing.id, other.id).await,
            Err(Error::NotInCandidatePeriod)
        ));
    }

    #[rocket::async_test]
    async fn listings_are_grouped_by_role() {
        let h = Harness::new();
        let election = h.recommending().await;
        let [a, b, c] = <[User; 3]>::try_from(h.members(3).await).unwrap();
        let auditor = h.stand(election.id, &a, Role::Auditor).await;
        let president = h.stand(election.id, &b, Role::President).await;
        nominate(&h, election.id, Role::President, &[(&c, 1)]).await;

        let all = h.desk.all(election.id).await.unwrap();
        let order: Vec<_> = all.iter().map(|c| (c.for_role, c.user_id)).collect();
        assert_eq!(
            order,
            [
                (Role::President, b.id),
                (Role::President, c.id),
                (Role::Auditor, a.id)
            ]
        );
        let accepted = h.desk.accepted(election.id).await.unwrap();
        assert_eq!(accepted, [president, auditor]);

        assert!(matches!(
            h.desk.all(Id::new()).await,
            Err(Error::ElectionNotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn views_count_recommendations_and_hide_votes_until_closed() {
        let h = Harness::new();
        let election = h.recommending().await;
        let nominee = h.member().await;
        // One backer from `stand`, two more here.
        nominate(&h, election.id, Role::Treasurer, &[(&nominee, 2)]).await;
        let candidate = h.stand(election.id, &nominee, Role::Treasurer).await;
        h.advance(election.id, ElectionStatus::Voting).await;

        let ballot = BallotSpec {
            votes: [(Role::Treasurer, candidate.id.into())].into_iter().collect(),
        };
        let voter = h.member().await;
        h.votes.cast(election.id, voter.id, &ballot).await.unwrap();

        let accepted = h.desk.accepted(election.id).await.unwrap();
        let views = h.desk.views(election.id, accepted).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].recommendation_count, 3);
        assert_eq!(views[0].vote_count, 0);

        h.advance(election.id, ElectionStatus::Closed).await;
        let accepted = h.desk.accepted(election.id).await.unwrap();
        let views = h.desk.views(election.id, accepted).await.unwrap();
        assert_eq!(views[0].recommendation_count, 3);
        assert_eq!(views[0].vote_count, 1);
    }
}
