use chrono::Utc;
use log::{info, warn};
use mongodb::{bson::doc, options::FindOneOptions, Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::eligibility::is_ongoing;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        election::{
            order_template, CandidateSpec, ElectionDescription, ElectionSpec, PartylistSpec,
            PositionSpec, VotersSpec,
        },
        id::ApiId,
        results::ElectionResults,
    },
    common::lifecycle::{only_active, Lifecycle},
    db::{
        candidate::Candidate,
        commissioner::Commissioner,
        election::Election,
        partylist::{Partylist, PartylistCore, INDEPENDENT_ACRONYM},
        position::Position,
        receipt::BallotReceipt,
        results::{FrozenResults, FrozenResultsCore},
        vote::Vote,
        voter::Voter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::tally::{self, ElectionContents};

use super::common::{conflict_if_duplicate, managed_election};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        delete_election,
        create_position,
        delete_position,
        create_partylist,
        delete_partylist,
        create_candidate,
        delete_candidate,
        register_voters,
        delete_voter,
        freeze_results,
    ]
}

#[allow(clippy::too_many_arguments)]
#[post("/commissioner/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Commissioner>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    partylists: Coll<Partylist>,
    positions: Coll<Position>,
    config: &State<Config>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    spec.validate()?;
    let slug = spec.slug.clone();
    let (election, templates) = spec.0.into_election(token.id);
    let election = Election {
        id: Id::new(),
        election,
    };
    let independent = Partylist {
        id: Id::new(),
        partylist: PartylistCore::independent(election.id),
    };
    let templates = order_template(election.id, templates)?
        .into_iter()
        .map(|position| Position {
            id: Id::new(),
            position,
        })
        .collect::<Vec<_>>();

    // Insert the election along with the rows every election starts with.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        elections
            .insert_one_with_session(&election, None, &mut session)
            .await
            .map_err(conflict_if_duplicate(format!("Election '{slug}'")))?;
        partylists
            .insert_one_with_session(&independent, None, &mut session)
            .await?;
        if !templates.is_empty() {
            positions
                .insert_many_with_session(&templates, None, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
    }
    info!(
        "Commissioner {} created election '{slug}' ({})",
        token.email, election.id
    );

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

/// Soft-delete an election and remove everything that belongs to it.
#[delete("/commissioner/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Commissioner>,
    election_id: Id,
    elections: Coll<Election>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<()> {
    let election = managed_election(&token, election_id, &elections).await?;

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        elections
            .update_one_with_session(election.id.as_doc(), Lifecycle::delete(), None, &mut session)
            .await?;

        let children = doc! { "election_id": election.id };
        Coll::<Position>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<Partylist>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<Candidate>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<Voter>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<Vote>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<BallotReceipt>::from_db(db)
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        Coll::<FrozenResults>::from_db(db)
            .delete_many_with_session(children, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }
    warn!(
        "Commissioner {} deleted election '{}' ({})",
        token.email, election.slug, election.id
    );

    Ok(())
}

#[post("/commissioner/elections/<election_id>/positions", data = "<spec>", format = "json")]
async fn create_position(
    token: AuthToken<Commissioner>,
    election_id: Id,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
) -> Result<Json<ApiId>> {
    let election = managed_election(&token, election_id, &elections).await?;
    spec.validate()?;

    // Without an explicit order, go after the last active position.
    let order = match spec.order {
        Some(order) => order,
        None => {
            let last = positions
                .find_one(
                    only_active(doc! { "election_id": election.id }),
                    FindOneOptions::builder().sort(doc! { "order": -1 }).build(),
                )
                .await?;
            match last {
                Some(last) => last.order.checked_add(1).ok_or_else(|| {
                    Error::BadRequest(format!(
                        "No display order left after '{}'; give one explicitly",
                        last.name
                    ))
                })?,
                None => 0,
            }
        }
    };

    let position = Position {
        id: Id::new(),
        position: spec.0.into_position(election.id, order),
    };
    positions
        .insert_one(&position, None)
        .await
        .map_err(conflict_if_duplicate(format!(
            "Position with order {}",
            position.order
        )))?;

    Ok(Json(position.id.into()))
}

/// Soft-delete a position together with its candidates.
#[delete("/commissioner/elections/<election_id>/positions/<position_id>")]
async fn delete_position(
    token: AuthToken<Commissioner>,
    election_id: Id,
    position_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
) -> Result<()> {
    let election = managed_election(&token, election_id, &elections).await?;
    let filter = only_active(doc! { "_id": position_id, "election_id": election.id });

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = positions
        .update_one_with_session(filter, Lifecycle::delete(), None, &mut session)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Position {position_id}")));
    }
    candidates
        .update_many_with_session(
            only_active(doc! { "position_id": position_id }),
            Lifecycle::delete(),
            None,
            &mut session,
        )
        .await?;

    session.commit_transaction().await?;
    Ok(())
}

#[post("/commissioner/elections/<election_id>/partylists", data = "<spec>", format = "json")]
async fn create_partylist(
    token: AuthToken<Commissioner>,
    election_id: Id,
    spec: Json<PartylistSpec>,
    elections: Coll<Election>,
    partylists: Coll<Partylist>,
) -> Result<Json<ApiId>> {
    let election = managed_election(&token, election_id, &elections).await?;
    spec.validate()?;

    let partylist = Partylist {
        id: Id::new(),
        partylist: spec.0.into_partylist(election.id),
    };
    partylists
        .insert_one(&partylist, None)
        .await
        .map_err(conflict_if_duplicate(format!(
            "Partylist '{}'",
            partylist.acronym
        )))?;

    Ok(Json(partylist.id.into()))
}

/// Soft-delete a partylist. Its candidates become independents.
#[delete("/commissioner/elections/<election_id>/partylists/<partylist_id>")]
async fn delete_partylist(
    token: AuthToken<Commissioner>,
    election_id: Id,
    partylist_id: Id,
    elections: Coll<Election>,
    partylists: Coll<Partylist>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
) -> Result<()> {
    let election = managed_election(&token, election_id, &elections).await?;
    let partylist = partylists
        .find_one(
            only_active(doc! { "_id": partylist_id, "election_id": election.id }),
            None,
        )
        .await?
        .ok_or_else(|| Error::not_found(format!("Partylist {partylist_id}")))?;
    if partylist.is_independent() {
        return Err(Error::Conflict(format!(
            "Partylist '{INDEPENDENT_ACRONYM}' cannot be deleted"
        )));
    }
    let independent = independent_partylist(election.id, &partylists).await?;

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    partylists
        .update_one_with_session(partylist.id.as_doc(), Lifecycle::delete(), None, &mut session)
        .await?;
    candidates
        .update_many_with_session(
            only_active(doc! { "partylist_id": partylist.id }),
            doc! { "$set": { "partylist_id": independent.id } },
            None,
            &mut session,
        )
        .await?;

    session.commit_transaction().await?;
    Ok(())
}

#[post("/commissioner/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    token: AuthToken<Commissioner>,
    election_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    partylists: Coll<Partylist>,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiId>> {
    let election = managed_election(&token, election_id, &elections).await?;
    spec.validate()?;

    let position_filter = only_active(doc! { "_id": spec.position_id, "election_id": election.id });
    if positions.find_one(position_filter, None).await?.is_none() {
        return Err(Error::not_found(format!("Position {}", spec.position_id)));
    }
    let partylist = match spec.partylist_id {
        Some(partylist_id) => partylists
            .find_one(
                only_active(doc! { "_id": partylist_id, "election_id": election.id }),
                None,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Partylist {partylist_id}")))?,
        None => independent_partylist(election.id, &partylists).await?,
    };

    let candidate = Candidate {
        id: Id::new(),
        candidate: spec.0.into_candidate(election.id, partylist.id),
    };
    candidates
        .insert_one(&candidate, None)
        .await
        .map_err(conflict_if_duplicate(format!("Candidate '{}'", candidate.slug)))?;

    Ok(Json(candidate.id.into()))
}

#[delete("/commissioner/elections/<election_id>/candidates/<candidate_id>")]
async fn delete_candidate(
    token: AuthToken<Commissioner>,
    election_id: Id,
    candidate_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<()> {
    let election = managed_election(&token, election_id, &elections).await?;
    let filter = only_active(doc! { "_id": candidate_id, "election_id": election.id });
    let result = candidates.update_one(filter, Lifecycle::delete(), None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    Ok(())
}

/// Register voters by email, all or none.
#[post("/commissioner/elections/<election_id>/voters", data = "<spec>", format = "json")]
async fn register_voters(
    token: AuthToken<Commissioner>,
    election_id: Id,
    spec: Json<VotersSpec>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    db_client: &State<Client>,
) -> Result<Json<Vec<ApiId>>> {
    let election = managed_election(&token, election_id, &elections).await?;
    let new_voters = spec
        .0
        .into_voters(election.id)?
        .into_iter()
        .map(|voter| Voter {
            id: Id::new(),
            voter,
        })
        .collect::<Vec<_>>();

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        voters
            .insert_many_with_session(&new_voters, None, &mut session)
            .await
            .map_err(conflict_if_duplicate("Voter"))?;
        session.commit_transaction().await?;
    }
    info!(
        "Registered {} voters in election '{}'",
        new_voters.len(),
        election.slug
    );

    Ok(Json(new_voters.iter().map(|v| v.id.into()).collect()))
}

#[delete("/commissioner/elections/<election_id>/voters/<voter_id>")]
async fn delete_voter(
    token: AuthToken<Commissioner>,
    election_id: Id,
    voter_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<()> {
    let election = managed_election(&token, election_id, &elections).await?;
    let filter = only_active(doc! { "_id": voter_id, "election_id": election.id });
    let result = voters.update_one(filter, Lifecycle::delete(), None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Voter {voter_id}")));
    }
    Ok(())
}

/// Compute and store the final results of a finished election, once.
#[post("/commissioner/elections/<election_id>/results/freeze")]
async fn freeze_results(
    token: AuthToken<Commissioner>,
    election_id: Id,
    elections: Coll<Election>,
    frozen: Coll<FrozenResults>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionResults>> {
    let election = managed_election(&token, election_id, &elections).await?;
    let now = Utc::now();
    if now <= election.end_date {
        return Err(Error::BadRequest(format!(
            "Election '{}' has not ended yet",
            election.slug
        )));
    }
    let already_frozen =
        || Error::Conflict(format!("Results of '{}' are already final", election.slug));
    if frozen
        .find_one(doc! { "election_id": election.id }, None)
        .await?
        .is_some()
    {
        return Err(already_frozen());
    }

    let results = tally::election_results(db_client, db, election.id, false).await?;
    let row = FrozenResults {
        id: Id::new(),
        frozen: FrozenResultsCore {
            election_id: election.id,
            generated_at: now,
            results,
        },
    };
    frozen.insert_one(&row, None).await.map_err(|err| {
        if is_duplicate_key_error(&err) {
            already_frozen()
        } else {
            err.into()
        }
    })?;
    info!("Froze results of election '{}'", election.slug);

    Ok(Json(row.frozen.results))
}

/// The reserved independent partylist of an election.
async fn independent_partylist(election_id: Id, partylists: &Coll<Partylist>) -> Result<Partylist> {
    let filter = only_active(doc! {
        "election_id": election_id,
        "acronym": INDEPENDENT_ACRONYM,
    });
    partylists
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Independent partylist of election {election_id}")))
}
