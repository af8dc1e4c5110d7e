use std::fmt::Display;

use log::debug;
use mongodb::{bson::doc, error::Error as DbError};

use crate::eligibility::VoterStanding;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::AuthToken,
    common::{lifecycle::only_active, publicity::Viewer},
    db::{
        commissioner::Commissioner, election::Election, receipt::BallotReceipt, voter::Voter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::recorder::find_receipt;

/// Get an active election by its ID.
pub async fn active_election_by_id(election_id: Id, elections: &Coll<Election>) -> Result<Election> {
    elections
        .find_one(only_active(election_id.as_doc()), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

/// Get an active election by its slug.
pub async fn active_election_by_slug(slug: &str, elections: &Coll<Election>) -> Result<Election> {
    elections
        .find_one(only_active(doc! { "slug": slug }), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election '{slug}'")))
}

/// Get an active election that the given commissioner manages.
pub async fn managed_election(
    token: &AuthToken<Commissioner>,
    election_id: Id,
    elections: &Coll<Election>,
) -> Result<Election> {
    let election = active_election_by_id(election_id, elections).await?;
    if !election.is_managed_by(token.id) {
        return Err(Error::Unauthorized(format!(
            "Commissioner {} does not manage election '{}'",
            token.email, election.slug
        )));
    }
    Ok(election)
}

/// Get the voter registration behind a voter token in a specific election.
pub async fn registered_voter(
    token: &AuthToken<Voter>,
    election_id: Id,
    voters: &Coll<Voter>,
) -> Result<Option<Voter>> {
    let filter = only_active(doc! {
        "election_id": election_id,
        "email": &token.email,
    });
    Ok(voters.find_one(filter, None).await?)
}

/// Work out what the (possibly anonymous) caller may do in an election.
pub async fn voter_standing(
    token: Option<&AuthToken<Voter>>,
    election_id: Id,
    voters: &Coll<Voter>,
    receipts: &Coll<BallotReceipt>,
) -> Result<VoterStanding> {
    let voter = match token {
        Some(token) => registered_voter(token, election_id, voters).await?,
        None => None,
    };
    let standing = match voter {
        None => VoterStanding::Unregistered,
        Some(voter) => match find_receipt(receipts, election_id, voter.id).await? {
            Some(_) => VoterStanding::Voted { voter_id: voter.id },
            None => VoterStanding::Eligible { voter_id: voter.id },
        },
    };
    Ok(standing)
}

/// Get an active election by slug, hiding it from callers its publicity does not admit.
pub async fn visible_election(
    slug: &str,
    commissioner: Option<&AuthToken<Commissioner>>,
    voter: Option<&AuthToken<Voter>>,
    elections: &Coll<Election>,
    voters: &Coll<Voter>,
) -> Result<Election> {
    let election = active_election_by_slug(slug, elections).await?;

    let is_registered = match voter {
        Some(token) => registered_voter(token, election.id, voters).await?.is_some(),
        None => false,
    };
    let viewer = if commissioner.map_or(false, |token| election.is_managed_by(token.id)) {
        Viewer::Commissioner
    } else if is_registered {
        Viewer::Voter
    } else {
        Viewer::Anonymous
    };

    if !election.publicity.admits(viewer) {
        debug!("Hiding election '{slug}' from {viewer:?} viewer");
        return Err(Error::not_found(format!("Election '{slug}'")));
    }
    Ok(election)
}

/// Map a duplicate key error from an insert into a [`Error::Conflict`] about `what`.
pub fn conflict_if_duplicate(what: impl Display) -> impl FnOnce(DbError) -> Error {
    move |err| {
        if is_duplicate_key_error(&err) {
            Error::Conflict(format!("{what} already exists"))
        } else {
            err.into()
        }
    }
}
