use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Who may look at an election's page and results.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Publicity {
    /// Commissioners only.
    #[default]
    Private,
    /// Registered voters and commissioners.
    Voter,
    /// Anyone.
    Public,
}

/// The standing of whoever is asking to view an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Voter,
    Commissioner,
}

impl Publicity {
    /// Can the given viewer see an election with this publicity?
    pub fn admits(self, viewer: Viewer) -> bool {
        match self {
            Self::Public => true,
            Self::Voter => viewer != Viewer::Anonymous,
            Self::Private => viewer == Viewer::Commissioner,
        }
    }
}

impl From<Publicity> for Bson {
    fn from(publicity: Publicity) -> Self {
        to_bson(&publicity).expect("Serialisation is infallible")
    }
}
