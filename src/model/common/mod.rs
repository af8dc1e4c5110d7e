//! Types shared between the database and API representations.

pub mod lifecycle;
pub mod publicity;
pub mod selection;
pub mod voting_hours;
