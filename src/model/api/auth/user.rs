use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    db::{commissioner::Commissioner, voter::Voter},
    mongodb::Id,
};

/// A user of our application, having defined rights.
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
    /// Get the user's ID.
    fn id(&self) -> Id;
    /// Get the user's email address.
    fn email(&self) -> &str;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Commissioner = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Commissioner => "commissioner",
            }
        )
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> Id {
        self.id
    }

    fn email(&self) -> &str {
        &self.voter.email
    }
}

impl User for Commissioner {
    const RIGHTS: Rights = Rights::Commissioner;

    fn id(&self) -> Id {
        self.id
    }

    fn email(&self) -> &str {
        &self.commissioner.email
    }
}
