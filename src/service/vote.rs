use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Error, Result};
use crate::model::{
    api::vote::{BallotSpec, RoleVoteStatus, VoteStatus},
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    db::vote::Vote,
    mongodb::Id,
};
use crate::store::{
    retry_transient, CandidateRepo, ElectionRepo, Insert, Store, Transaction, VoteRepo,
};

pub type HmacSha256 = Hmac<Sha256>;

/// A one-way token identifying a single ballot.
///
/// Keyed by the server's secret salt, so it cannot be recomputed (and the
/// voter cannot be recovered) by anyone without the salt.
pub fn ballot_hash(
    salt: &[u8],
    election_id: Id,
    voter_id: Id,
    cast_at: DateTime<Utc>,
    role: Role,
) -> String {
    let mut hmac = HmacSha256::new_from_slice(salt).expect("HMAC can take key of any size");
    hmac.update(
        format!(
            "{election_id}:{voter_id}:{}:{role}",
            cast_at.timestamp_millis()
        )
        .as_bytes(),
    );
    HEXLOWER.encode(&hmac.finalize().into_bytes())
}

/// Casts members' ballots during the `VOTING` phase.
pub struct VoteEngine {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    salt: Vec<u8>,
}

impl VoteEngine {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>, salt: Vec<u8>) -> Self {
        Self { store, audit, salt }
    }

    /// Cast one vote per role in `ballot`, all or nothing.
    ///
    /// Returns the roles voted for, in declaration order.
    pub async fn cast(
        &self,
        election_id: Id,
        voter_id: Id,
        ballot: &BallotSpec,
    ) -> Result<Vec<Role>> {
        let roles = retry_transient(move || self.cast_once(election_id, voter_id, ballot)).await?;

        info!(
            "Voter {voter_id} cast {} vote(s) in election {election_id}",
            roles.len()
        );
        self.audit.record(&AuditEvent::VotesCast {
            election_id,
            voter_id,
            roles: roles.clone(),
        });
        Ok(roles)
    }

    async fn cast_once(
        &self,
        election_id: Id,
        voter_id: Id,
        ballot: &BallotSpec,
    ) -> Result<Vec<Role>> {
        let mut txn = self.store.begin().await?;
        let election = txn
            .find_election(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        let now = Utc::now();
        if election.status != ElectionStatus::Voting || !election.dates().voting_open_at(now) {
            return Err(Error::NotInVotingPeriod);
        }
        if ballot.votes.is_empty() {
            return Err(Error::NoCandidateSelected);
        }

        let already_voted: Vec<Role> = txn
            .votes_by_voter(election_id, voter_id)
            .await?
            .into_iter()
            .map(|v| v.for_role)
            .collect();

        let mut roles = Vec::with_capacity(ballot.votes.len());
        for (&role, &candidate_id) in &ballot.votes {
            if already_voted.contains(&role) {
                return Err(Error::DuplicateVoteForRole(role));
            }
            let candidate_id = Id::from(candidate_id);
            let candidate = txn
                .find_candidate(candidate_id)
                .await?
                .ok_or(Error::CandidateNotFound(candidate_id))?;
            if candidate.status != CandidateStatus::Accepted {
                return Err(Error::CandidateNotApproved(candidate_id));
            }
            if candidate.election_id != election_id {
                return Err(Error::InvalidCandidate(format!(
                    "candidate {candidate_id} is not standing in election {election_id}"
                )));
            }
            if candidate.for_role != role {
                return Err(Error::InvalidCandidate(format!(
                    "candidate {candidate_id} is standing for {}, not {role}",
                    candidate.for_role
                )));
            }

            let vote = Vote {
                id: Id::new(),
                election_id,
                voter_id,
                candidate_id,
                for_role: role,
                ballot_hash: ballot_hash(&self.salt, election_id, voter_id, now, role),
                created_at: now,
            };
            if txn.insert_vote(&vote).await? == Insert::Duplicate {
                return Err(Error::DuplicateVoteForRole(role));
            }
            txn.increment_vote_count(candidate_id).await?;
            roles.push(role);
        }

        txn.commit().await?;
        Ok(roles)
    }

    /// Which roles the voter has voted for. Never reveals who for.
    pub async fn status(&self, election_id: Id, voter_id: Id) -> Result<VoteStatus> {
        let votes = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            if txn.find_election(election_id).await?.is_none() {
                return Err(Error::ElectionNotFound(election_id));
            }
            txn.votes_by_voter(election_id, voter_id).await
        })
        .await?;

        let cast: HashMap<Role, DateTime<Utc>> =
            votes.iter().map(|v| (v.for_role, v.created_at)).collect();
        let roles = Role::ALL
            .into_iter()
            .map(|role| RoleVoteStatus {
                role,
                has_voted: cast.contains_key(&role),
                voted_at: cast.get(&role).copied(),
            })
            .collect();
        Ok(VoteStatus {
            election_id: election_id.into(),
            has_voted_any: !cast.is_empty(),
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{
        api::{election::ElectionSpec, ApiId},
        db::{candidate::Candidate, election::Election, user::User},
    };
    use crate::service::harness::{Harness, TEST_SALT};

    fn ballot(choices: &[(Role, &Candidate)]) -> BallotSpec {
        BallotSpec {
            votes: choices
                .iter()
                .map(|(role, c)| (*role, ApiId::from(c.id)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// A voting election with one accepted candidate per role.
    async fn voting(h: &Harness) -> (Election, Vec<Candidate>) {
        let election = h.recommending().await;
        let mut candidates = Vec::new();
        for role in Role::ALL {
            let nominee = h.member().await;
            candidates.push(h.stand(election.id, &nominee, role).await);
        }
        let election = h.advance(election.id, ElectionStatus::Voting).await;
        (election, candidates)
    }

    #[test]
    fn ballot_hash_is_keyed_hex() {
        let (election, voter, now) = (Id::new(), Id::new(), Utc::now());
        let hash = ballot_hash(TEST_SALT, election, voter, now, Role::President);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(
            hash,
            ballot_hash(TEST_SALT, election, voter, now, Role::President)
        );
        assert_ne!(
            hash,
            ballot_hash(TEST_SALT, election, voter, now, Role::Secretary)
        );
        assert_ne!(
            hash,
            ballot_hash(b"another salt", election, voter, now, Role::President)
        );
    }

    #[rocket::async_test]
    async fn cast_stores_one_vote_per_role() {
        let h = Harness::new();
        let (election, candidates) = voting(&h).await;
        let voter = h.member().await;

        let roles = h
            .votes
            .cast(
                election.id,
                voter.id,
                &ballot(&[
                    (Role::Treasurer, &candidates[3]),
                    (Role::President, &candidates[0]),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(roles, [Role::President, Role::Treasurer]);

        let votes = h.store.votes().await;
        assert_eq!(votes.len(), 2);
        assert!(votes.iter().all(|v| v.voter_id == voter.id));
        assert_ne!(votes[0].ballot_hash, votes[1].ballot_hash);

        let counts: Vec<_> = h
            .store
            .candidates()
            .await
            .into_iter()
            .map(|c| (c.for_role, c.vote_count))
            .collect();
        assert!(counts.contains(&(Role::President, 1)));
        assert!(counts.contains(&(Role::Treasurer, 1)));
        assert!(counts.contains(&(Role::Auditor, 0)));

        assert!(h.audit.events().contains(&AuditEvent::VotesCast {
            election_id: election.id,
            voter_id: voter.id,
            roles: vec![Role::President, Role::Treasurer],
        }));
    }

    #[rocket::async_test]
    async fn second_vote_for_a_role_is_rejected() {
        let h = Harness::new();
        let (election, candidates) = voting(&h).await;
        let voter = h.member().await;
        let choice = ballot(&[(Role::President, &candidates[0])]);

        h.votes.cast(election.id, voter.id, &choice).await.unwrap();
        assert!(matches!(
            h.votes.cast(election.id, voter.id, &choice).await,
            Err(Error::DuplicateVoteForRole(Role::President))
        ));
        assert_eq!(h.store.votes().await.len(), 1);
    }

    #[rocket::async_test]
    async fn failures_store_nothing() {
        let h = Harness::new();
        let (election, candidates) = voting(&h).await;
        let voter = h.member().await;
        h.votes
            .cast(
                election.id,
                voter.id,
                &ballot(&[(Role::Auditor, &candidates[4])]),
            )
            .await
            .unwrap();

        // The President vote would be fine, but Auditor is a duplicate.
        let result = h
            .votes
            .cast(
                election.id,
                voter.id,
                &ballot(&[
                    (Role::President, &candidates[0]),
                    (Role::Auditor, &candidates[4]),
                ]),
            )
            .await;
        assert!(matches!(result, Err(Error::DuplicateVoteForRole(Role::Auditor))));
        assert_eq!(h.store.votes().await.len(), 1);
        let president = h
            .store
            .candidates()
            .await
            .into_iter()
            .find(|c| c.id == candidates[0].id)
            .unwrap();
        assert_eq!(president.vote_count, 0);
    }

    #[rocket::async_test]
    async fn empty_ballots_are_rejected() {
        let h = Harness::new();
        let (election, _) = voting(&h).await;
        let voter = h.member().await;
        assert!(matches!(
            h.votes
                .cast(election.id, voter.id, &BallotSpec::default())
                .await,
            Err(Error::NoCandidateSelected)
        ));
    }

    #[rocket::async_test]
    async fn only_accepted_candidates_of_the_role() {
        let h = Harness::new();
        let election = h.recommending().await;
        let [standing, pending_user] = <[User; 2]>::try_from(h.members(2).await).unwrap();
        let president = h.stand(election.id, &standing, Role::President).await;
        let backer = h.member().await;
        h.recommend(election.id, &backer, &pending_user, Role::Secretary)
            .await
            .unwrap();
        let pending = h
            .store
            .candidates()
            .await
            .into_iter()
            .find(|c| c.user_id == pending_user.id)
            .unwrap();
        h.advance(election.id, ElectionStatus::Voting).await;
        let voter = h.member().await;

        assert!(matches!(
            h.votes
                .cast(election.id, voter.id, &ballot(&[(Role::Secretary, &pending)]))
                .await,
            Err(Error::CandidateNotApproved(id)) if id == pending.id
        ));
        assert!(matches!(
            h.votes
                .cast(election.id, voter.id, &ballot(&[(Role::Treasurer, &president)]))
                .await,
            Err(Error::InvalidCandidate(_))
        ));

        let mut stranger = president.clone();
        stranger.id = Id::new();
        assert!(matches!(
            h.votes
                .cast(election.id, voter.id, &ballot(&[(Role::President, &stranger)]))
                .await,
            Err(Error::CandidateNotFound(id)) if id == stranger.id
        ));
        assert!(h.store.votes().await.is_empty());
    }

    #[rocket::async_test]
    async fn candidates_from_other_elections_are_rejected() {
        let h = Harness::new();
        let (election, _) = voting(&h).await;
        let (_, other_candidates) = voting(&h).await;
        let voter = h.member().await;
        assert!(matches!(
            h.votes
                .cast(
                    election.id,
                    voter.id,
                    &ballot(&[(Role::President, &other_candidates[0])])
                )
                .await,
            Err(Error::InvalidCandidate(_))
        ));
    }

    #[rocket::async_test]
    async fn only_while_voting_is_open() {
        let h = Harness::new();
        let voter = h.member().await;
        let choice = BallotSpec::default();

        for status in [
            ElectionStatus::Planning,
            ElectionStatus::Recommend,
            ElectionStatus::CandidateConfirm,
            ElectionStatus::Closed,
            ElectionStatus::Cancelled,
        ] {
            let election = h.election(ElectionSpec::current_example(), status).await;
            assert!(matches!(
                h.votes.cast(election.id, voter.id, &choice).await,
                Err(Error::NotInVotingPeriod)
            ));
        }

        // In VOTING, but the window has not opened yet.
        let early = h
            .election(ElectionSpec::future_example(), ElectionStatus::Voting)
            .await;
        assert!(matches!(
            h.votes.cast(early.id, voter.id, &choice).await,
            Err(Error::NotInVotingPeriod)
        ));

        assert!(matches!(
            h.votes.cast(Id::new(), voter.id, &choice).await,
            Err(Error::ElectionNotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn concurrent_duplicate_votes_store_one_row() {
        let h = Harness::new();
        let (election, candidates) = voting(&h).await;
        let voter = h.member().await;
        let choice = ballot(&[(Role::VicePresident, &candidates[1])]);
        let (election_id, voter_id) = (election.id, voter.id);

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let engine = h.votes.clone();
                let choice = choice.clone();
                rocket::tokio::spawn(
                    async move { engine.cast(election_id, voter_id, &choice).await },
                )
            })
            .collect();

        let (mut ok, mut duplicate) = (0, 0);
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(Error::DuplicateVoteForRole(Role::VicePresident)) => duplicate += 1,
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!((ok, duplicate), (1, 9));
        assert_eq!(h.store.votes().await.len(), 1);
        let candidate = h
            .store
            .candidates()
            .await
            .into_iter()
            .find(|c| c.id == candidates[1].id)
            .unwrap();
        assert_eq!(candidate.vote_count, 1);
    }

    #[rocket::async_test]
    async fn status_reports_roles_without_choices() {
        let h = Harness::new();
        let (election, candidates) = voting(&h).await;
        let voter = h.member().await;

        let before = h.votes.status(election.id, voter.id).await.unwrap();
        assert!(!before.has_voted_any);
        assert_eq!(before.roles.len(), Role::ALL.len());
        assert!(before.roles.iter().all(|r| !r.has_voted && r.voted_at.is_none()));

        h.votes
            .cast(
                election.id,
                voter.id,
                &ballot(&[(Role::Secretary, &candidates[2])]),
            )
            .await
            .unwrap();
        let after = h.votes.status(election.id, voter.id).await.unwrap();
        assert!(after.has_voted_any);
        let voted: Vec<_> = after
            .roles
            .iter()
            .filter(|r| r.has_voted)
            .map(|r| r.role)
            .collect();
        assert_eq!(voted, [Role::Secretary]);
        assert!(after.roles[2].voted_at.is_some());

        assert!(matches!(
            h.votes.status(Id::new(), voter.id).await,
            Err(Error::ElectionNotFound(_))
        ));
    }
}
