use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The record that a voter has cast their ballot in an election.
///
/// There is a unique index on `(election_id, voter_id)`, so at most one of
/// these can ever exist per voter and election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceiptCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key voter ID.
    pub voter_id: Id,
    /// When the ballot was recorded.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A receipt without an ID.
pub type NewBallotReceipt = BallotReceiptCore;

/// A receipt from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub receipt: BallotReceiptCore,
}
