use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::{
    common::lifecycle::Lifecycle,
    db::{
        candidate::{Candidate, NewCandidate},
        commissioner::{Commissioner, NewCommissioner},
        election::{Election, NewElection},
        partylist::{NewPartylist, Partylist},
        position::{NewPosition, Position},
        receipt::{BallotReceipt, NewBallotReceipt},
        results::{FrozenResults, NewFrozenResults},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter},
    },
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

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

/// Implement [`MongoCollection`] for a stored type and its ID-less insertion form.
macro_rules! collection {
    ($name:literal: $($ty:ty),+) => {
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

collection!("commissioners": Commissioner, NewCommissioner);
collection!("elections": Election, NewElection);
collection!("positions": Position, NewPosition);
collection!("partylists": Partylist, NewPartylist);
collection!("candidates": Candidate, NewCandidate);
collection!("voters": Voter, NewVoter);
collection!("votes": Vote, NewVote);
collection!("receipts": BallotReceipt, NewBallotReceipt);
collection!("frozen_results": FrozenResults, NewFrozenResults);

/// Ensure that all the required indexes exist on the given database.
///
/// Uniqueness among soft-deleted rows is not enforced: those indexes are partial
/// over active rows only.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_while_active = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(Lifecycle::active())
        .build();

    // Commissioners.
    create_index::<Commissioner>(db, doc! {"email": 1}, unique.clone()).await?;

    // Elections: the slug is global and never reused, even after deletion.
    create_index::<Election>(db, doc! {"slug": 1}, unique.clone()).await?;

    // Election contents.
    create_index::<Position>(
        db,
        doc! {"election_id": 1, "order": 1},
        unique_while_active.clone(),
    )
    .await?;
    create_index::<Partylist>(
        db,
        doc! {"election_id": 1, "acronym": 1},
        unique_while_active.clone(),
    )
    .await?;
    create_index::<Candidate>(
        db,
        doc! {"election_id": 1, "slug": 1},
        unique_while_active.clone(),
    )
    .await?;
    create_index::<Voter>(
        db,
        doc! {"election_id": 1, "email": 1},
        unique_while_active,
    )
    .await?;

    // Votes are only ever read per election, so index for the tally.
    let votes_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "position_id": 1, "candidate_id": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(votes_index, None)
        .await?;

    // One ballot per voter per election, enforced by the storage layer.
    create_index::<BallotReceipt>(
        db,
        doc! {"election_id": 1, "voter_id": 1},
        unique.clone(),
    )
    .await?;

    // Final results are written once.
    create_index::<FrozenResults>(db, doc! {"election_id": 1}, unique).await?;

    Ok(())
}

async fn create_index<T: MongoCollection>(
    db: &Database,
    keys: Document,
    options: IndexOptions,
) -> Result<(), DbError> {
    let index = IndexModel::builder().keys(keys).options(options).build();
    Coll::<T>::from_db(db).create_index(index, None).await?;
    Ok(())
}
