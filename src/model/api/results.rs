use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// Vote counts for every position of an election, in display order.
///
/// Live and frozen results share this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub positions: Vec<PositionResults>,
}

/// Vote counts for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResults {
    pub id: ApiId,
    pub name: String,
    /// Every ballot line for this position, abstentions included.
    pub total_votes: u64,
    pub abstentions: u64,
    /// Candidates by descending vote count.
    pub candidates: Vec<CandidateResult>,
}

/// Vote count for one candidate.
///
/// While voting is ongoing the name fields are empty and `display_name` is a
/// positional label such as "Candidate 1".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ApiId,
    pub display_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub partylist_acronym: String,
    pub vote_count: u64,
}
