use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::lifecycle::Lifecycle, mongodb::Id};

/// Core voter data, as stored in the database.
///
/// Whether the voter has voted is not stored here; it is derived from the
/// presence of a [`super::receipt::BallotReceipt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Unique among the election's active voters.
    pub email: String,
    pub lifecycle: Lifecycle,
}

impl VoterCore {
    pub fn new(election_id: Id, email: &str) -> Self {
        Self {
            election_id,
            email: normalize_email(email),
            lifecycle: Lifecycle::Active,
        }
    }
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        let voter = VoterCore::new(Id::new(), "  Juan.DelaCruz@Example.com ");
        assert_eq!(voter.email, "juan.delacruz@example.com");
    }
}
