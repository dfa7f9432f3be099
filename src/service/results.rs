use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::percentage;
use crate::error::{Error, Result};
use crate::model::{
    api::election::{
        CandidateTally, ElectionProgress, ResultDetail, ResultSummary, RoleProgress, RoleResult,
        RoleWinner, Turnout, Winner,
    },
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    db::{candidate::Candidate, election::Election, recommendation::Recommendation, vote::Vote},
    mongodb::Id,
};
use crate::store::{retry_transient, ElectionRepo, Store, VoteRepo};

/// Everything needed to tally a closed election.
struct Ballots {
    election: Election,
    eligible: u64,
    candidates: Vec<Candidate>,
    votes: Vec<Vote>,
}

/// Everything needed to report on an election in progress.
struct Activity {
    election: Election,
    eligible: u64,
    candidates: Vec<Candidate>,
    recommendations: Vec<Recommendation>,
    votes: Vec<Vote>,
}

/// Tallies closed elections. Read-only.
pub struct ResultsAggregator {
    store: Arc<dyn Store>,
}

impl ResultsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Turnout and the winner of each contested role.
    pub async fn summary(&self, election_id: Id) -> Result<ResultSummary> {
        let (election, turnout, roles) = self.tally(election_id).await?;
        let winners = roles
            .into_iter()
            .map(|r| RoleWinner {
                role: r.role,
                winner: r.winner,
            })
            .collect();
        Ok(ResultSummary {
            election_id: election_id.into(),
            election_name: election.name,
            election_status: election.status,
            turnout,
            winners,
        })
    }

    /// Turnout and the per-candidate breakdown of each contested role.
    pub async fn detail(&self, election_id: Id) -> Result<ResultDetail> {
        let (election, turnout, roles) = self.tally(election_id).await?;
        Ok(ResultDetail {
            election_id: election_id.into(),
            election_name: election.name,
            election_status: election.status,
            turnout,
            roles,
        })
    }

    /// Participation so far, in any status.
    pub async fn progress(&self, election_id: Id) -> Result<ElectionProgress> {
        let activity = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            let election = txn
                .find_election(election_id)
                .await?
                .ok_or(Error::ElectionNotFound(election_id))?;
            Ok(Activity {
                election,
                eligible: txn.count_active_users().await?,
                candidates: txn.candidates_for_election(election_id).await?,
                recommendations: txn.recommendations_for_election(election_id).await?,
                votes: txn.votes_for_election(election_id).await?,
            })
        })
        .await?;
        Ok(progress(activity))
    }

    async fn tally(&self, election_id: Id) -> Result<(Election, Turnout, Vec<RoleResult>)> {
        let ballots = retry_transient(move || async move {
            let mut txn = self.store.begin().await?;
            let election = txn
                .find_election(election_id)
                .await?
                .ok_or(Error::ElectionNotFound(election_id))?;
            if election.status != ElectionStatus::Closed {
                return Err(Error::ElectionNotClosed);
            }
            Ok(Ballots {
                eligible: txn.count_active_users().await?,
                candidates: txn.candidates_for_election(election_id).await?,
                votes: txn.votes_for_election(election_id).await?,
                election,
            })
        })
        .await?;

        debug!(
            "Tallying {} vote(s) across {} candidate(s) in election {election_id}",
            ballots.votes.len(),
            ballots.candidates.len()
        );
        let turnout = turnout(&ballots);
        let roles = role_results(&ballots);
        Ok((ballots.election, turnout, roles))
    }
}

fn progress(activity: Activity) -> ElectionProgress {
    let eligible = activity.eligible;
    let voters: HashSet<Id> = activity.votes.iter().map(|v| v.voter_id).collect();
    let total_votes = activity.votes.len() as u64;
    let roles = Role::ALL
        .into_iter()
        .map(|role| {
            let votes = activity.votes.iter().filter(|v| v.for_role == role).count() as u64;
            RoleProgress {
                role,
                votes,
                vote_rate: percentage(votes, eligible),
                recommendations: activity
                    .recommendations
                    .iter()
                    .filter(|r| r.for_role == role)
                    .count() as u64,
                accepted_candidates: activity
                    .candidates
                    .iter()
                    .filter(|c| c.for_role == role && c.status == CandidateStatus::Accepted)
                    .count() as u64,
            }
        })
        .collect();

    ElectionProgress {
        election_id: activity.election.id.into(),
        election_name: activity.election.name,
        election_status: activity.election.status,
        total_eligible_voters: eligible,
        total_voters: voters.len() as u64,
        total_votes,
        total_recommendations: activity.recommendations.len() as u64,
        total_candidates: activity.candidates.len() as u64,
        participation_rate: percentage(total_votes, eligible * Role::ALL.len() as u64),
        roles,
    }
}

fn turnout(ballots: &Ballots) -> Turnout {
    let voters: HashSet<Id> = ballots.votes.iter().map(|v| v.voter_id).collect();
    let total_voters = voters.len() as u64;
    Turnout {
        total_eligible_voters: ballots.eligible,
        total_voters,
        turnout_rate: percentage(total_voters, ballots.eligible),
    }
}

/// Results for every role that received at least one vote, in role order.
///
/// Counts come from the ballots themselves rather than the candidates'
/// denormalised counters.
fn role_results(ballots: &Ballots) -> Vec<RoleResult> {
    let mut counts: BTreeMap<Role, HashMap<Id, u64>> = BTreeMap::new();
    for vote in &ballots.votes {
        *counts
            .entry(vote.for_role)
            .or_default()
            .entry(vote.candidate_id)
            .or_default() += 1;
    }

    let mut results = Vec::with_capacity(counts.len());
    for (role, role_counts) in counts {
        let total_votes: u64 = role_counts.values().sum();
        let mut tallies: Vec<(&Candidate, u64)> = ballots
            .candidates
            .iter()
            .filter(|c| c.for_role == role)
            .filter_map(|c| match role_counts.get(&c.id) {
                Some(&votes) => Some((c, votes)),
                None if c.status == CandidateStatus::Accepted => Some((c, 0)),
                None => None,
            })
            .collect();
        tallies.sort_by(|(a, a_votes), (b, b_votes)| {
            b_votes.cmp(a_votes).then(a.id.cmp(&b.id))
        });

        let Some(&(leader, leader_votes)) = tallies.first() else {
            // Votes for candidates that no longer exist.
            warn!("Election has {role} votes for unknown candidates; skipping role");
            continue;
        };
        let winner = Winner {
            candidate_id: leader.id.into(),
            user_id: leader.user_id.into(),
            votes: leader_votes,
            vote_percentage: percentage(leader_votes, total_votes),
            tie: tallies
                .get(1)
                .map_or(false, |&(_, votes)| votes == leader_votes),
        };
        let candidates = tallies
            .into_iter()
            .map(|(c, votes)| CandidateTally {
                candidate_id: c.id.into(),
                user_id: c.user_id.into(),
                votes,
                vote_percentage: percentage(votes, total_votes),
            })
            .collect();
        results.push(RoleResult {
            role,
            total_votes,
            candidates,
            winner,
        });
    }
    results
}
