use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        lifecycle::Lifecycle, publicity::Publicity, voting_hours::VotingHours,
    },
    db::{
        candidate::NewCandidate,
        election::NewElection,
        partylist::{is_reserved_acronym, NewPartylist},
        position::NewPosition,
        voter::{normalize_email, NewVoter},
    },
    mongodb::Id,
};

/// Election slugs that would collide with application routes.
pub const RESERVED_SLUGS: &[&str] = &[
    "about",
    "account",
    "admin",
    "api",
    "commissioner",
    "contact",
    "dashboard",
    "docs",
    "elections",
    "help",
    "pricing",
    "register",
    "settings",
    "signin",
    "signout",
];

const MAX_SLUG_LEN: usize = 64;

/// Check that a slug is non-empty lowercase ASCII letters, digits and inner hyphens.
fn validate_slug(slug: &str) -> Result<()> {
    let well_formed = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(Error::BadRequest(format!("Malformed slug '{slug}'")));
    }
    Ok(())
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest(format!("{what} must not be empty")));
    }
    Ok(())
}

/// An election specification, as submitted by a commissioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub slug: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub publicity: Publicity,
    #[serde(default)]
    pub voting_hours: Option<VotingHours>,
    /// Template positions created along with the election.
    #[serde(default)]
    pub positions: Vec<PositionSpec>,
}

impl ElectionSpec {
    pub fn validate(&self) -> Result<()> {
        validate_slug(&self.slug)?;
        if RESERVED_SLUGS.contains(&self.slug.as_str()) {
            return Err(Error::BadRequest(format!(
                "Slug '{}' is reserved",
                self.slug
            )));
        }
        validate_name("Election name", &self.name)?;
        if self.start_date >= self.end_date {
            return Err(Error::BadRequest(
                "Election must start before it ends".to_string(),
            ));
        }
        if let Some(hours) = self.voting_hours {
            if !hours.is_valid() {
                return Err(Error::BadRequest(format!(
                    "Invalid voting hours {}-{}",
                    hours.start_hour, hours.end_hour
                )));
            }
        }
        for position in self.positions.iter() {
            position.validate()?;
        }
        Ok(())
    }

    /// Convert this spec into an election managed by the given commissioner,
    /// plus its template positions (not yet tied to an election ID).
    pub fn into_election(self, commissioner: Id) -> (NewElection, Vec<PositionSpec>) {
        let election = NewElection {
            slug: self.slug,
            name: self.name.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            voting_hours: self.voting_hours,
            publicity: self.publicity,
            commissioners: vec![commissioner],
            lifecycle: Lifecycle::Active,
        };
        (election, self.positions)
    }
}

fn default_max() -> u32 {
    1
}

/// A position specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSpec {
    pub name: String,
    /// Display order; defaults to after every existing position.
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_max")]
    pub max: u32,
}

impl PositionSpec {
    pub fn validate(&self) -> Result<()> {
        validate_name("Position name", &self.name)?;
        if self.max == 0 || self.min > self.max {
            return Err(Error::BadRequest(format!(
                "Invalid selection bounds {}..={} for position '{}'",
                self.min, self.max, self.name
            )));
        }
        Ok(())
    }

    /// Convert into a position of the given election, using `fallback_order`
    /// if the spec did not choose one.
    pub fn into_position(self, election_id: Id, fallback_order: u32) -> NewPosition {
        NewPosition {
            election_id,
            name: self.name.trim().to_string(),
            order: self.order.unwrap_or(fallback_order),
            min: self.min,
            max: self.max,
            lifecycle: Lifecycle::Active,
        }
    }
}

/// Give a list of template positions concrete display orders, in list order,
/// and check no two end up with the same one.
pub(crate) fn order_template(
    election_id: Id,
    positions: Vec<PositionSpec>,
) -> Result<Vec<NewPosition>> {
    let positions: Vec<_> = positions
        .into_iter()
        .zip(0u32..)
        .map(|(spec, order)| spec.into_position(election_id, order))
        .collect();
    for (i, position) in positions.iter().enumerate() {
        if positions[..i].iter().any(|p| p.order == position.order) {
            return Err(Error::Conflict(format!(
                "Two positions share display order {}",
                position.order
            )));
        }
    }
    Ok(positions)
}

/// A partylist specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartylistSpec {
    pub name: String,
    pub acronym: String,
}

impl PartylistSpec {
    pub fn validate(&self) -> Result<()> {
        validate_name("Partylist name", &self.name)?;
        validate_name("Partylist acronym", &self.acronym)?;
        if is_reserved_acronym(&self.acronym) {
            return Err(Error::Conflict(format!(
                "Acronym '{}' is reserved",
                self.acronym
            )));
        }
        Ok(())
    }

    pub fn into_partylist(self, election_id: Id) -> NewPartylist {
        NewPartylist {
            election_id,
            name: self.name.trim().to_string(),
            acronym: self.acronym.trim().to_uppercase(),
            lifecycle: Lifecycle::Active,
        }
    }
}

/// A candidate specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub slug: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub position_id: Id,
    /// Defaults to the election's independent partylist.
    #[serde(default)]
    pub partylist_id: Option<Id>,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        validate_slug(&self.slug)?;
        validate_name("First name", &self.first_name)?;
        validate_name("Last name", &self.last_name)?;
        Ok(())
    }

    pub fn into_candidate(self, election_id: Id, partylist_id: Id) -> NewCandidate {
        NewCandidate {
            election_id,
            position_id: self.position_id,
            partylist_id,
            slug: self.slug,
            first_name: self.first_name.trim().to_string(),
            middle_name: self
                .middle_name
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            last_name: self.last_name.trim().to_string(),
            lifecycle: Lifecycle::Active,
        }
    }
}

/// Voters to register, by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotersSpec {
    pub emails: Vec<String>,
}

impl VotersSpec {
    /// Normalize and check the emails, rejecting duplicates within the request.
    pub fn into_voters(self, election_id: Id) -> Result<Vec<NewVoter>> {
        let mut voters: Vec<NewVoter> = Vec::with_capacity(self.emails.len());
        for email in self.emails {
            let normalized = normalize_email(&email);
            let looks_valid = matches!(
                normalized.split_once('@'),
                Some((local, domain)) if !local.is_empty() && domain.contains('.')
            );
            if !looks_valid {
                return Err(Error::BadRequest(format!("Malformed email '{email}'")));
            }
            if voters.iter().any(|v| v.email == normalized) {
                return Err(Error::Conflict(format!("Duplicate email '{normalized}'")));
            }
            voters.push(NewVoter::new(election_id, &normalized));
        }
        if voters.is_empty() {
            return Err(Error::BadRequest("No voters given".to_string()));
        }
        Ok(voters)
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use chrono::{Duration, Timelike};

    use super::*;

    fn midnight_today() -> DateTime<Utc> {
        Utc::now()
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap()
    }

    impl ElectionSpec {
        /// A public election that is open right now, with two template positions.
        pub fn current_example() -> Self {
            let start_date = midnight_today() - Duration::days(1);
            Self {
                slug: "student-council".to_string(),
                name: "Student Council Election".to_string(),
                start_date,
                end_date: start_date + Duration::days(30),
                publicity: Publicity::Public,
                voting_hours: None,
                positions: vec![PositionSpec::example("President"), PositionSpec::example("Auditor")],
            }
        }
    }

    impl PositionSpec {
        pub fn example(name: &str) -> Self {
            Self {
                name: name.to_string(),
                order: None,
                min: 0,
                max: 1,
            }
        }
    }
}
