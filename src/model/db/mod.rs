//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//!
//! Each stored type `X` comes as an `XCore` holding the data, a `NewX` alias
//! for insertion (no ID yet), and `X` itself, which adds the database ID.

pub mod candidate;
pub mod commissioner;
pub mod election;
pub mod partylist;
pub mod position;
pub mod receipt;
pub mod results;
pub mod vote;
pub mod voter;
