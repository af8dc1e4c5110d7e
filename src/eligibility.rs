//! Decides whether a vote may be cast: right now, by this voter, in this election.
//!
//! Everything here is a pure function of its arguments. The current time is
//! always passed in, never read from a clock.

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

use crate::error::{Error, Result};
use crate::model::{db::election::Election, mongodb::Id};

/// How the voting window is evaluated, from [`crate::config::Config`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Whether an election's daily voting hours restrict voting at all.
    pub enforce_voting_hours: bool,
    /// The offset in which daily voting hours are read.
    pub offset: FixedOffset,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            enforce_voting_hours: false,
            offset: Utc.fix(),
        }
    }
}

/// What is known about the caller's registration in the election.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VoterStanding {
    /// No active voter row for this email in this election.
    Unregistered,
    /// Registered, no ballot yet.
    Eligible { voter_id: Id },
    /// Registered and a ballot receipt exists.
    Voted { voter_id: Id },
}

/// Is the election accepting votes at `now`?
///
/// The date range `[start_date, end_date]` is inclusive at both ends. When the
/// policy enforces voting hours and the election has some, the local hour must
/// also fall inside them.
pub fn is_ongoing(election: &Election, now: DateTime<Utc>, policy: &WindowPolicy) -> bool {
    if now < election.start_date || now > election.end_date {
        return false;
    }
    match election.voting_hours {
        Some(hours) if policy.enforce_voting_hours => {
            hours.contains(now.with_timezone(&policy.offset).hour())
        }
        _ => true,
    }
}

/// Gate a vote submission, returning the ID of the voter allowed to vote.
///
/// Checks run in order: the election exists and is active, the voting window is
/// open, then the caller's standing.
pub fn check(
    election: Option<&Election>,
    now: DateTime<Utc>,
    standing: VoterStanding,
    policy: &WindowPolicy,
) -> Result<Id> {
    let election = election
        .filter(|e| e.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Election"))?;

    if !is_ongoing(election, now, policy) {
        return Err(Error::NotOngoing(format!(
            "Election '{}' is not accepting votes at {}",
            election.slug, now
        )));
    }

    match standing {
        VoterStanding::Unregistered => Err(Error::Unauthorized(format!(
            "Not a registered voter of election '{}'",
            election.slug
        ))),
        VoterStanding::Voted { voter_id } => Err(Error::AlreadyVoted(format!(
            "Voter {voter_id} in election '{}'",
            election.slug
        ))),
        VoterStanding::Eligible { voter_id } => Ok(voter_id),
    }
}
