use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::results::ElectionResults, mongodb::Id};

/// Final results for an election, computed once and stored verbatim.
/// Nothing ever recomputes or replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenResultsCore {
    /// Foreign Key election ID; unique.
    pub election_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub generated_at: DateTime<Utc>,
    pub results: ElectionResults,
}

/// Frozen results without an ID.
pub type NewFrozenResults = FrozenResultsCore;

/// Frozen results from the database, with their unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenResults {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub frozen: FrozenResultsCore,
}
