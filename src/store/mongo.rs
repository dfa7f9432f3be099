use mongodb::{
    bson::{doc, Bson, Document},
    error::Error as DbError,
    options::{
        Acknowledgment, FindOneAndUpdateOptions, FindOptions, ReadConcern, ReturnDocument,
        TransactionOptions, UpdateOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};

use crate::error::{Error, Result};
use crate::model::{
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    db::{
        candidate::{Candidate, CandidateKey},
        election::Election,
        recommendation::{Recommendation, RecommenderLedger},
        user::User,
        vote::Vote,
    },
    mongodb::{is_duplicate_key_error, is_unknown_commit_result, Coll, Id},
};

use super::{
    CandidateRepo, ElectionFilter, ElectionRepo, Insert, Page, RecommendationRepo, Store,
    Transaction, UserDirectory, VoteRepo, MAX_ATTEMPTS,
};

/// The MongoDB-backed store.
///
/// Requires a replica set (or sharded cluster), since every unit of work
/// runs inside a multi-document transaction.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(options).await?;
        Ok(Box::new(MongoTransaction {
            session,
            db: self.db.clone(),
        }))
    }
}

/// A transaction bound to one client session.
///
/// A failed write aborts the server-side transaction, so after any error
/// (including a reported [`Insert::Duplicate`]) the transaction must be
/// abandoned.
struct MongoTransaction {
    session: ClientSession,
    db: Database,
}

impl MongoTransaction {
    fn coll<T: crate::model::mongodb::MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// Insert a document guarded by a unique index.
    async fn insert_unique<T>(&mut self, value: &T) -> Result<Insert>
    where
        T: crate::model::mongodb::MongoCollection + serde::Serialize + Send + Sync,
    {
        let coll = self.coll::<T>();
        match coll
            .insert_one_with_session(value, None, &mut self.session)
            .await
        {
            Ok(_) => Ok(Insert::Inserted),
            Err(err) if is_duplicate_key_error(&err) => Ok(Insert::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    /// Collect every document matching `filter`, in the given order.
    async fn find_all<T>(&mut self, filter: Document, sort: Document) -> Result<Vec<T>>
    where
        T: crate::model::mongodb::MongoCollection
            + serde::de::DeserializeOwned
            + Unpin
            + Send
            + Sync,
    {
        let coll = self.coll::<T>();
        let options = FindOptions::builder().sort(sort).build();
        let mut cursor = coll
            .find_with_session(filter, options, &mut self.session)
            .await?;
        let mut items = Vec::new();
        while let Some(item) = cursor.next(&mut self.session).await {
            items.push(item?);
        }
        Ok(items)
    }
}

/// Racing upserts on the same key surface as duplicate key errors; the
/// loser re-runs its unit of work and finds the winner's document.
fn upsert_conflict(err: DbError, what: &str) -> Error {
    if is_duplicate_key_error(&err) {
        Error::WriteConflict(format!("concurrent upsert of {what}"))
    } else {
        err.into()
    }
}

fn election_filter_doc(filter: &ElectionFilter) -> Document {
    let mut query = Document::new();
    if !filter.include_inactive {
        query.insert("is_active", true);
    }
    if let Some(status) = filter.status {
        query.insert("status", status);
    }
    query
}

fn election_details_doc(election: &Election) -> Document {
    doc! {
        "name": &election.name,
        "description": election.description.clone().map_or(Bson::Null, Bson::String),
        "recommendation_start": election.recommendation_start,
        "recommendation_end": election.recommendation_end,
        "voting_start": election.voting_start,
        "voting_end": election.voting_end,
        "max_recommendations": i64::from(election.max_recommendations),
        "is_active": election.is_active,
    }
}

fn candidate_key_doc(key: &CandidateKey) -> Document {
    doc! {
        "user_id": key.user_id,
        "election_id": key.election_id,
        "for_role": key.for_role,
    }
}

/// Something that can commit a transaction and tell when a failed commit
/// left the outcome unknown.
#[rocket::async_trait]
trait Commit: Send {
    type Error: std::fmt::Display + Send;

    async fn try_commit(&mut self) -> std::result::Result<(), Self::Error>;

    fn outcome_unknown(err: &Self::Error) -> bool;
}

#[rocket::async_trait]
impl Commit for ClientSession {
    type Error = DbError;

    async fn try_commit(&mut self) -> std::result::Result<(), DbError> {
        self.commit_transaction().await
    }

    fn outcome_unknown(err: &DbError) -> bool {
        is_unknown_commit_result(err)
    }
}

/// Commit, re-sending only the commit while its outcome is unknown.
///
/// Committing is idempotent on the server, whereas re-running the unit of
/// work after a commit that was in fact applied would see its own writes.
async fn commit_until_known<C: Commit>(session: &mut C) -> std::result::Result<(), C::Error> {
    let mut attempt = 1;
    loop {
        match session.try_commit().await {
            Err(e) if C::outcome_unknown(&e) && attempt < MAX_ATTEMPTS => {
                debug!("Commit result unknown on attempt {attempt}, retrying commit: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[rocket::async_trait]
impl Transaction for MongoTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        commit_until_known(&mut self.session).await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl ElectionRepo for MongoTransaction {
    async fn find_election(&mut self, id: Id) -> Result<Option<Election>> {
        let elections = self.coll::<Election>();
        Ok(elections
            .find_one_with_session(id.as_doc(), None, &mut self.session)
            .await?)
    }

    async fn list_elections(
        &mut self,
        filter: &ElectionFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Page<Election>> {
        let elections = self.coll::<Election>();
        let query = election_filter_doc(filter);
        let total = elections
            .count_documents_with_session(query.clone(), None, &mut self.session)
            .await?;

        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1, "_id": -1})
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let mut cursor = elections
            .find_with_session(query, options, &mut self.session)
            .await?;
        let mut items = Vec::new();
        while let Some(election) = cursor.next(&mut self.session).await {
            items.push(election?);
        }
        Ok(Page { items, total })
    }

    async fn insert_election(&mut self, election: &Election) -> Result<()> {
        let elections = self.coll::<Election>();
        elections
            .insert_one_with_session(election, None, &mut self.session)
            .await?;
        Ok(())
    }

    async fn replace_election_details(&mut self, election: &Election) -> Result<()> {
        let elections = self.coll::<Election>();
        let update = doc! {"$set": election_details_doc(election)};
        elections
            .update_one_with_session(election.id.as_doc(), update, None, &mut self.session)
            .await?;
        Ok(())
    }

    async fn update_election_status(
        &mut self,
        id: Id,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool> {
        let elections = self.coll::<Election>();
        let filter = doc! {"_id": id, "status": from};
        let update = doc! {"$set": {"status": to}};
        let result = elections
            .update_one_with_session(filter, update, None, &mut self.session)
            .await?;
        Ok(result.modified_count == 1)
    }
}

#[rocket::async_trait]
impl UserDirectory for MongoTransaction {
    async fn find_user(&mut self, id: Id) -> Result<Option<User>> {
        let users = self.coll::<User>();
        Ok(users
            .find_one_with_session(id.as_doc(), None, &mut self.session)
            .await?)
    }

    async fn count_active_users(&mut self) -> Result<u64> {
        let users = self.coll::<User>();
        Ok(users
            .count_documents_with_session(doc! {"is_active": true}, None, &mut self.session)
            .await?)
    }
}

#[rocket::async_trait]
impl CandidateRepo for MongoTransaction {
    async fn find_candidate(&mut self, id: Id) -> Result<Option<Candidate>> {
        let candidates = self.coll::<Candidate>();
        Ok(candidates
            .find_one_with_session(id.as_doc(), None, &mut self.session)
            .await?)
    }

    async fn get_or_create_candidate(&mut self, key: CandidateKey) -> Result<Candidate> {
        let candidates = self.coll::<Candidate>();
        let fresh = Candidate::pending(key);
        // The key fields come from the filter on insert.
        let update = doc! {
            "$setOnInsert": {
                "_id": fresh.id,
                "status": fresh.status,
                "statement": Bson::Null,
                "vote_count": 0_i64,
                "created_at": fresh.created_at,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let candidate = candidates
            .find_one_and_update_with_session(
                candidate_key_doc(&key),
                update,
                options,
                &mut self.session,
            )
            .await
            .map_err(|e| upsert_conflict(e, "candidate"))?;
        candidate.ok_or_else(|| Error::WriteConflict("candidate upsert returned nothing".to_string()))
    }

    async fn candidates_for_election(&mut self, election_id: Id) -> Result<Vec<Candidate>> {
        self.find_all(doc! {"election_id": election_id}, doc! {"_id": 1})
            .await
    }

    async fn update_candidate_status(
        &mut self,
        id: Id,
        from: CandidateStatus,
        to: CandidateStatus,
        statement: Option<String>,
    ) -> Result<bool> {
        let candidates = self.coll::<Candidate>();
        let filter = doc! {"_id": id, "status": from};
        let mut set = doc! {"status": to};
        if let Some(statement) = statement {
            set.insert("statement", statement);
        }
        let result = candidates
            .update_one_with_session(filter, doc! {"$set": set}, None, &mut self.session)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn increment_vote_count(&mut self, id: Id) -> Result<()> {
        let candidates = self.coll::<Candidate>();
        candidates
            .update_one_with_session(
                id.as_doc(),
                doc! {"$inc": {"vote_count": 1_i64}},
                None,
                &mut self.session,
            )
            .await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl RecommendationRepo for MongoTransaction {
    async fn find_recommendation(
        &mut self,
        election_id: Id,
        recommender_id: Id,
        for_role: Role,
    ) -> Result<Option<Recommendation>> {
        let recommendations = self.coll::<Recommendation>();
        let filter = doc! {
            "election_id": election_id,
            "recommender_id": recommender_id,
            "for_role": for_role,
        };
        Ok(recommendations
            .find_one_with_session(filter, None, &mut self.session)
            .await?)
    }

    async fn lock_recommender(&mut self, election_id: Id, recommender_id: Id) -> Result<()> {
        let ledgers = self.coll::<RecommenderLedger>();
        let filter = doc! {"election_id": election_id, "recommender_id": recommender_id};
        let options = UpdateOptions::builder().upsert(true).build();
        ledgers
            .update_one_with_session(
                filter,
                doc! {"$inc": {"writes": 1_i64}},
                options,
                &mut self.session,
            )
            .await
            .map_err(|e| upsert_conflict(e, "recommender ledger"))?;
        Ok(())
    }

    async fn count_recommendations_by(
        &mut self,
        election_id: Id,
        recommender_id: Id,
    ) -> Result<u64> {
        let recommendations = self.coll::<Recommendation>();
        let filter = doc! {"election_id": election_id, "recommender_id": recommender_id};
        Ok(recommendations
            .count_documents_with_session(filter, None, &mut self.session)
            .await?)
    }

    async fn insert_recommendation(&mut self, recommendation: &Recommendation) -> Result<Insert> {
        self.insert_unique(recommendation).await
    }

    async fn recommendations_for_election(
        &mut self,
        election_id: Id,
    ) -> Result<Vec<Recommendation>> {
        self.find_all(
            doc! {"election_id": election_id},
            doc! {"created_at": -1, "_id": -1},
        )
        .await
    }
}

#[rocket::async_trait]
impl VoteRepo for MongoTransaction {
    async fn votes_by_voter(&mut self, election_id: Id, voter_id: Id) -> Result<Vec<Vote>> {
        self.find_all(
            doc! {"election_id": election_id, "voter_id": voter_id},
            doc! {"_id": 1},
        )
        .await
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<Insert> {
        self.insert_unique(vote).await
    }

    async fn votes_for_election(&mut self, election_id: Id) -> Result<Vec<Vote>> {
        self.find_all(doc! {"election_id": election_id}, doc! {"_id": 1})
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::model::common::election::ElectionDates;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CommitError {
        Unknown,
        Aborted,
    }

    impl fmt::Display for CommitError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    /// Replays a fixed sequence of commit results, then succeeds.
    struct ScriptedSession {
        results: Vec<CommitError>,
        commits: usize,
    }

    impl ScriptedSession {
        fn failing_with(results: Vec<CommitError>) -> Self {
            Self {
                results,
                commits: 0,
            }
        }
    }

    #[rocket::async_trait]
    impl Commit for ScriptedSession {
        type Error = CommitError;

        async fn try_commit(&mut self) -> std::result::Result<(), CommitError> {
            self.commits += 1;
            if self.results.is_empty() {
                Ok(())
            } else {
                Err(self.results.remove(0))
            }
        }

        fn outcome_unknown(err: &CommitError) -> bool {
            *err == CommitError::Unknown
        }
    }

    #[rocket::async_test]
    async fn unknown_commit_results_retry_the_commit_only() {
        let mut session = ScriptedSession::failing_with(vec![CommitError::Unknown; 2]);
        assert_eq!(commit_until_known(&mut session).await, Ok(()));
        assert_eq!(session.commits, 3);
    }

    #[rocket::async_test]
    async fn other_commit_failures_are_returned() {
        let mut session =
            ScriptedSession::failing_with(vec![CommitError::Unknown, CommitError::Aborted]);
        assert_eq!(
            commit_until_known(&mut session).await,
            Err(CommitError::Aborted)
        );
        assert_eq!(session.commits, 2);
    }

    #[rocket::async_test]
    async fn commit_retries_are_bounded() {
        let mut session = ScriptedSession::failing_with(vec![CommitError::Unknown; 10]);
        assert_eq!(
            commit_until_known(&mut session).await,
            Err(CommitError::Unknown)
        );
        assert_eq!(session.commits, MAX_ATTEMPTS);
    }

    #[test]
    fn default_filter_hides_inactive_elections() {
        let filter = ElectionFilter::default();
        assert_eq!(election_filter_doc(&filter), doc! {"is_active": true});
    }

    #[test]
    fn filter_by_status() {
        let filter = ElectionFilter {
            status: Some(ElectionStatus::Voting),
            include_inactive: true,
        };
        assert_eq!(election_filter_doc(&filter), doc! {"status": "VOTING"});
    }

    #[test]
    fn details_never_touch_the_status() {
        let election = Election::new(
            "AGM".to_string(),
            Some("Annual".to_string()),
            ElectionDates::future_example(),
            2,
        );
        let details = election_details_doc(&election);
        assert!(!details.contains_key("status"));
        assert!(!details.contains_key("_id"));
        assert_eq!(details.get_i64("max_recommendations").unwrap(), 2);
        assert_eq!(details.get_str("description").unwrap(), "Annual");
    }

    #[test]
    fn candidate_key_matches_unique_index() {
        let key = CandidateKey {
            user_id: Id::new(),
            election_id: Id::new(),
            for_role: Role::Auditor,
        };
        let filter = candidate_key_doc(&key);
        let fields: Vec<_> = filter.keys().cloned().collect();
        assert_eq!(fields, ["user_id", "election_id", "for_role"]);
        assert_eq!(filter.get_str("for_role").unwrap(), "AUDITOR");
    }
}
