use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{lifecycle::Lifecycle, publicity::Publicity, voting_hours::VotingHours},
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// URL-friendly unique name.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Voting opens at this instant.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// Voting closes at this instant.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    /// Optional daily window layered on top of the date range.
    pub voting_hours: Option<VotingHours>,
    /// Who may view the election.
    pub publicity: Publicity,
    /// Commissioners allowed to manage this election.
    pub commissioners: Vec<Id>,
    pub lifecycle: Lifecycle,
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Is the given commissioner allowed to manage this election?
    pub fn is_managed_by(&self, commissioner: Id) -> bool {
        self.commissioners.contains(&commissioner)
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use chrono::TimeZone;

    use super::*;

    impl Election {
        /// A public election running throughout 2024-01-01 (UTC).
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                election: ElectionCore {
                    slug: "student-council-2024".to_string(),
                    name: "Student Council 2024".to_string(),
                    start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    end_date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                    voting_hours: None,
                    publicity: Publicity::Public,
                    commissioners: vec![],
                    lifecycle: Lifecycle::Active,
                },
            }
        }
    }
}
