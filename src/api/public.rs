use chrono::Utc;
use mongodb::{bson::doc, Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::eligibility::is_ongoing;
use crate::error::{Error, Result};
use crate::model::{
    api::{auth::AuthToken, election::ElectionDescription, results::ElectionResults},
    db::{
        commissioner::Commissioner, election::Election, results::FrozenResults, voter::Voter,
    },
    mongodb::Coll,
};
use crate::tally::{self, ElectionContents};

use super::common::visible_election;

pub fn routes() -> Vec<Route> {
    routes![election_description, live_results, final_results]
}

#[get("/elections/<slug>")]
async fn election_description(
    slug: &str,
    commissioner: Option<AuthToken<Commissioner>>,
    voter: Option<AuthToken<Voter>>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    let election = visible_election(
        slug,
        commissioner.as_ref(),
        voter.as_ref(),
        &elections,
        &voters,
    )
    .await?;
    let ongoing = is_ongoing(&election, Utc::now(), &config.window_policy());

    let contents = ElectionContents::load(db, election.id).await?;
    Ok(Json(ElectionDescription::new(
        election,
        contents.positions,
        contents.partylists,
        contents.candidates,
        ongoing,
    )))
}

/// Current vote counts. Candidate names stay hidden while voting is ongoing.
#[allow(clippy::too_many_arguments)]
#[get("/elections/<slug>/results")]
async fn live_results(
    slug: &str,
    commissioner: Option<AuthToken<Commissioner>>,
    voter: Option<AuthToken<Voter>>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    config: &State<Config>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionResults>> {
    let election = visible_election(
        slug,
        commissioner.as_ref(),
        voter.as_ref(),
        &elections,
        &voters,
    )
    .await?;
    let ongoing = is_ongoing(&election, Utc::now(), &config.window_policy());

    let results = tally::election_results(db_client, db, election.id, ongoing).await?;
    Ok(Json(results))
}

#[get("/elections/<slug>/results/final")]
async fn final_results(
    slug: &str,
    commissioner: Option<AuthToken<Commissioner>>,
    voter: Option<AuthToken<Voter>>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    frozen: Coll<FrozenResults>,
) -> Result<Json<ElectionResults>> {
    let election = visible_election(
        slug,
        commissioner.as_ref(),
        voter.as_ref(),
        &elections,
        &voters,
    )
    .await?;

    let frozen = frozen
        .find_one(doc! { "election_id": election.id }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Final results of election '{slug}'")))?;
    Ok(Json(frozen.frozen.results))
}
