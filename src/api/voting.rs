use chrono::Utc;
use mongodb::{Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::eligibility;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        ballot::{BallotAccepted, BallotSpec, VoterStatus},
    },
    db::{election::Election, receipt::BallotReceipt, voter::Voter},
    mongodb::{Coll, Id},
};
use crate::recorder::{self, find_receipt};
use crate::tally::ElectionContents;

use super::common::{active_election_by_id, registered_voter, voter_standing};

pub fn routes() -> Vec<Route> {
    routes![submit_ballot, voter_status]
}

/// Cast the caller's complete ballot for an election.
///
/// A missing or invalid voter token is treated like an unregistered voter, so
/// the election and window checks still run first.
#[allow(clippy::too_many_arguments)]
#[post("/elections/<election_id>/ballot", data = "<ballot>", format = "json")]
async fn submit_ballot(
    token: Option<AuthToken<Voter>>,
    election_id: Id,
    ballot: Json<Vec<BallotSpec>>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    receipts: Coll<BallotReceipt>,
    config: &State<Config>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BallotAccepted>> {
    let now = Utc::now();

    let election = elections.find_one(election_id.as_doc(), None).await?;
    let standing = voter_standing(token.as_ref(), election_id, &voters, &receipts).await?;
    let voter_id = eligibility::check(election.as_ref(), now, standing, &config.window_policy())?;

    let contents = ElectionContents::load(db, election_id).await?;
    let votes = recorder::flatten_ballot(
        election_id,
        voter_id,
        &contents.positions,
        &contents.candidates,
        &ballot,
    )?;
    let accepted = recorder::record_ballot(db_client, db, election_id, voter_id, votes, now).await?;

    Ok(Json(accepted))
}

#[get("/elections/<election_id>/voter")]
async fn voter_status(
    token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    receipts: Coll<BallotReceipt>,
) -> Result<Json<VoterStatus>> {
    let election = active_election_by_id(election_id, &elections).await?;
    let voter = registered_voter(&token, election.id, &voters)
        .await?
        .ok_or_else(|| {
            Error::Unauthorized(format!(
                "{} is not a voter of election '{}'",
                token.email, election.slug
            ))
        })?;

    let receipt = find_receipt(&receipts, election.id, voter.id).await?;
    Ok(Json(VoterStatus {
        has_voted: receipt.is_some(),
        cast_at: receipt.map(|r| r.receipt.cast_at),
    }))
}
