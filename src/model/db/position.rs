use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::lifecycle::Lifecycle, mongodb::Id};

/// Core position data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Display name, e.g. "President".
    pub name: String,
    /// Display order; unique among the election's active positions.
    pub order: u32,
    /// Minimum number of candidates a non-abstaining voter must pick.
    pub min: u32,
    /// Maximum number of candidates a voter may pick.
    pub max: u32,
    pub lifecycle: Lifecycle,
}

impl PositionCore {
    /// The fewest candidates a voter may pick without abstaining.
    pub fn min_selections(&self) -> u32 {
        self.min.max(1)
    }
}

/// A position without an ID.
pub type NewPosition = PositionCore;

/// A position from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub position: PositionCore,
}

impl Deref for Position {
    type Target = PositionCore;

    fn deref(&self) -> &Self::Target {
        &self.position
    }
}

impl DerefMut for Position {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.position
    }
}
