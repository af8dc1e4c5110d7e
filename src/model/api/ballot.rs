use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::selection::Selection, mongodb::Id};

/// A voter's choices for one position, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BallotSpec {
    pub position_id: Id,
    pub selections: Vec<Selection>,
}

/// Response to an accepted ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotAccepted {
    /// Number of ballot lines written.
    pub votes_recorded: usize,
    pub cast_at: DateTime<Utc>,
}

/// Whether the requesting voter has voted in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub has_voted: bool,
    pub cast_at: Option<DateTime<Utc>>,
}
