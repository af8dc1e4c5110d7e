use serde::{Deserialize, Serialize};

use crate::model::{common::selection::Selection, mongodb::Id};

/// A single ballot line, as stored in the database.
///
/// Vote rows are insert-only: nothing ever updates them, and only deleting the
/// whole election removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key voter ID.
    pub voter_id: Id,
    /// Foreign Key position ID.
    pub position_id: Id,
    /// Foreign Key candidate ID, or `None` for an explicit abstention.
    pub candidate_id: Option<Id>,
}

impl VoteCore {
    /// A ballot line for one selection.
    pub fn new(election_id: Id, voter_id: Id, position_id: Id, selection: Selection) -> Self {
        Self {
            election_id,
            voter_id,
            position_id,
            candidate_id: selection.candidate(),
        }
    }

    /// What this line records.
    pub fn selection(&self) -> Selection {
        match self.candidate_id {
            Some(id) => Selection::Candidate(id),
            None => Selection::Abstain,
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}
