use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::lifecycle::Lifecycle, mongodb::Id};

/// Acronym of the partylist every election has for candidates without a party.
pub const INDEPENDENT_ACRONYM: &str = "IND";

/// Core partylist data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartylistCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    pub name: String,
    /// Short name; unique among the election's active partylists.
    pub acronym: String,
    pub lifecycle: Lifecycle,
}

impl PartylistCore {
    /// The independent partylist seeded into every new election.
    pub fn independent(election_id: Id) -> Self {
        Self {
            election_id,
            name: "Independent".to_string(),
            acronym: INDEPENDENT_ACRONYM.to_string(),
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn is_independent(&self) -> bool {
        is_reserved_acronym(&self.acronym)
    }
}

/// Is the given acronym the reserved independent one (in any letter case)?
pub fn is_reserved_acronym(acronym: &str) -> bool {
    acronym.trim().eq_ignore_ascii_case(INDEPENDENT_ACRONYM)
}

/// A partylist without an ID.
pub type NewPartylist = PartylistCore;

/// A partylist from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partylist {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub partylist: PartylistCore,
}

impl Deref for Partylist {
    type Target = PartylistCore;

    fn deref(&self) -> &Self::Target {
        &self.partylist
    }
}

impl DerefMut for Partylist {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.partylist
    }
}
