use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::lifecycle::Lifecycle, mongodb::Id};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key position ID.
    pub position_id: Id,
    /// Foreign Key partylist ID.
    pub partylist_id: Id,
    /// URL-friendly name; unique among the election's active candidates.
    pub slug: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub lifecycle: Lifecycle,
}

impl CandidateCore {
    /// "First Middle Last", skipping a missing middle name.
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name() {
        let mut candidate = Candidate::example(Id::new(), Id::new(), "Juan", "Dela Cruz");
        assert_eq!(candidate.full_name(), "Juan Dela Cruz");
        candidate.middle_name = Some("Santos".to_string());
        assert_eq!(candidate.full_name(), "Juan Santos Dela Cruz");
        candidate.middle_name = Some(String::new());
        assert_eq!(candidate.full_name(), "Juan Dela Cruz");
    }
}
