use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core commissioner data. Commissioners are provisioned by the identity
/// provider; this service only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionerCore {
    pub email: String,
    pub name: String,
}

/// A commissioner without an ID.
pub type NewCommissioner = CommissionerCore;

/// A commissioner from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commissioner {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub commissioner: CommissionerCore,
}

impl Deref for Commissioner {
    type Target = CommissionerCore;

    fn deref(&self) -> &Self::Target {
        &self.commissioner
    }
}
