use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    candidate::Candidate,
    election::Election,
    recommendation::{Recommendation, RecommenderLedger},
    user::User,
    vote::Vote,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Recommendation {
    const NAME: &'static str = "recommendations";
}

impl MongoCollection for RecommenderLedger {
    const NAME: &'static str = "recommender_ledgers";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what actually guarantee one candidacy, one
/// recommendation and one vote per (user, election, role); the existence
/// checks made before inserting only produce friendlier errors.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "election_id": 1, "for_role": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Recommendation collection.
    let recommendation_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "recommender_id": 1, "for_role": 1})
        .options(unique.clone())
        .build();
    Coll::<Recommendation>::from_db(db)
        .create_index(recommendation_index, None)
        .await?;

    // Recommender ledger collection.
    let ledger_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "recommender_id": 1})
        .options(unique.clone())
        .build();
    Coll::<RecommenderLedger>::from_db(db)
        .create_index(ledger_index, None)
        .await?;

    // Vote collection.
    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1, "for_role": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Listing elections.
    let election_index = IndexModel::builder()
        .keys(doc! {"is_active": 1, "status": 1, "created_at": -1})
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    Ok(())
}
