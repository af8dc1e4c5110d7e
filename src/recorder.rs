//! Ballot recording: validation, flattening into vote rows, and the atomic write.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use mongodb::{bson::doc, error::Error as DbError, Client, Database};

use crate::error::{Error, Result};
use crate::model::{
    api::ballot::{BallotAccepted, BallotSpec},
    common::selection::Selection,
    db::{
        candidate::Candidate,
        position::Position,
        receipt::{BallotReceipt, NewBallotReceipt},
        vote::NewVote,
    },
    mongodb::{is_duplicate_key_error, is_write_conflict, Coll, Id},
};

/// Check a submitted ballot against the election's active positions and
/// candidates, and flatten it into one vote row per selection.
///
/// Rows that are deleted or belong to another election are ignored, so callers
/// may pass whatever they loaded.
pub fn flatten_ballot(
    election_id: Id,
    voter_id: Id,
    positions: &[Position],
    candidates: &[Candidate],
    ballot: &[BallotSpec],
) -> Result<Vec<NewVote>> {
    let positions: HashMap<Id, &Position> = positions
        .iter()
        .filter(|p| p.election_id == election_id && p.lifecycle.is_active())
        .map(|p| (p.id, p))
        .collect();
    let candidates: HashMap<Id, &Candidate> = candidates
        .iter()
        .filter(|c| c.election_id == election_id && c.lifecycle.is_active())
        .map(|c| (c.id, c))
        .collect();

    if positions.is_empty() {
        return Err(Error::BadRequest(format!(
            "Election {election_id} has no positions to vote on"
        )));
    }

    let mut answered = HashSet::new();
    let mut rows = Vec::new();
    for spec in ballot {
        let position = positions
            .get(&spec.position_id)
            .ok_or_else(|| Error::not_found(format!("Position {}", spec.position_id)))?;
        if !answered.insert(position.id) {
            return Err(Error::BadRequest(format!(
                "Position '{}' appears more than once",
                position.name
            )));
        }
        check_selections(position, &candidates, &spec.selections)?;
        rows.extend(
            spec.selections
                .iter()
                .map(|&selection| NewVote::new(election_id, voter_id, position.id, selection)),
        );
    }

    if answered.len() != positions.len() {
        let mut missing = positions
            .values()
            .filter(|p| !answered.contains(&p.id))
            .collect::<Vec<_>>();
        missing.sort_by_key(|p| p.order);
        let names = missing
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::BadRequest(format!("No selection for: {names}")));
    }

    Ok(rows)
}

/// Validate the selections made for a single position.
fn check_selections(
    position: &Position,
    candidates: &HashMap<Id, &Candidate>,
    selections: &[Selection],
) -> Result<()> {
    if selections.contains(&Selection::Abstain) {
        if selections.len() != 1 {
            return Err(Error::BadRequest(format!(
                "An abstention must be the only selection for '{}'",
                position.name
            )));
        }
        return Ok(());
    }

    let mut chosen = HashSet::new();
    for candidate_id in selections.iter().filter_map(Selection::candidate) {
        let candidate = candidates
            .get(&candidate_id)
            .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
        if candidate.position_id != position.id {
            return Err(Error::not_found(format!(
                "Candidate {candidate_id} for position '{}'",
                position.name
            )));
        }
        if !chosen.insert(candidate_id) {
            return Err(Error::BadRequest(format!(
                "Candidate {candidate_id} selected twice for '{}'",
                position.name
            )));
        }
    }

    let count = chosen.len() as u32;
    if count < position.min_selections() || count > position.max {
        return Err(Error::BadRequest(format!(
            "'{}' takes between {} and {} selections, got {count}",
            position.name,
            position.min_selections(),
            position.max
        )));
    }
    Ok(())
}

/// Find the receipt for a voter's ballot in an election, if they have voted.
pub async fn find_receipt(
    receipts: &Coll<BallotReceipt>,
    election_id: Id,
    voter_id: Id,
) -> Result<Option<BallotReceipt>> {
    let filter = doc! {
        "election_id": election_id,
        "voter_id": voter_id,
    };
    Ok(receipts.find_one(filter, None).await?)
}

/// Atomically write a flattened ballot: the receipt and every vote row, or nothing.
///
/// The absence of earlier vote rows is re-checked inside the transaction, and the
/// receipt's unique index rejects a second ballot that slips past that check.
pub async fn record_ballot(
    db_client: &Client,
    db: &Database,
    election_id: Id,
    voter_id: Id,
    votes: Vec<NewVote>,
    now: DateTime<Utc>,
) -> Result<BallotAccepted> {
    let receipts = Coll::<NewBallotReceipt>::from_db(db);
    let vote_rows = Coll::<NewVote>::from_db(db);
    let write_failed = |err: DbError| into_ballot_error(err, election_id, voter_id);

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Re-check standing now that we are inside the transaction.
        let filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
        };
        let prior = vote_rows
            .count_documents_with_session(filter, None, &mut session)
            .await
            .map_err(write_failed)?;
        if prior > 0 {
            // Dropping the session aborts the transaction.
            warn!("Voter {voter_id} already has {prior} vote rows in election {election_id}");
            return Err(already_voted(election_id, voter_id));
        }

        let receipt = NewBallotReceipt {
            election_id,
            voter_id,
            cast_at: now,
        };
        receipts
            .insert_one_with_session(&receipt, None, &mut session)
            .await
            .map_err(write_failed)?;
        vote_rows
            .insert_many_with_session(&votes, None, &mut session)
            .await
            .map_err(write_failed)?;

        session.commit_transaction().await.map_err(write_failed)?;
    }

    info!(
        "Recorded ballot of voter {voter_id} in election {election_id} ({} rows)",
        votes.len()
    );
    Ok(BallotAccepted {
        votes_recorded: votes.len(),
        cast_at: now,
    })
}

fn already_voted(election_id: Id, voter_id: Id) -> Error {
    Error::AlreadyVoted(format!("Voter {voter_id} in election {election_id}"))
}

/// Classify a database error raised while writing a ballot.
///
/// The receipt's `(election_id, voter_id)` key is the only one two ballots can
/// contend on, so both a duplicate key and a write conflict mean the voter's
/// other ballot got there first.
fn into_ballot_error(err: DbError, election_id: Id, voter_id: Id) -> Error {
    if is_duplicate_key_error(&err) {
        debug!("Receipt index rejected a second ballot from voter {voter_id}");
        already_voted(election_id, voter_id)
    } else if is_write_conflict(&err) {
        warn!("Concurrent ballot from voter {voter_id} in election {election_id} lost: {err}");
        already_voted(election_id, voter_id)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::common::lifecycle::Lifecycle;

    /// An election with two single-seat positions and two candidates for the first.
    struct Fixture {
        election_id: Id,
        voter_id: Id,
        positions: Vec<Position>,
        candidates: Vec<Candidate>,
    }

    impl Fixture {
        fn new() -> Self {
            let election_id = Id::new();
            let partylist = Id::new();
            let president = Position::example(election_id, "President", 1);
            let auditor = Position::example(election_id, "Auditor", 2);
            let mut candidates = vec![
                Candidate::example(president.id, partylist, "Ana", "Reyes"),
                Candidate::example(president.id, partylist, "Ben", "Santos"),
                Candidate::example(auditor.id, partylist, "Carla", "Lim"),
            ];
            for candidate in candidates.iter_mut() {
                candidate.election_id = election_id;
            }
            Self {
                election_id,
                voter_id: Id::new(),
                positions: vec![president, auditor],
                candidates,
            }
        }

        fn flatten(&self, ballot: &[BallotSpec]) -> Result<Vec<NewVote>> {
            flatten_ballot(
                self.election_id,
                self.voter_id,
                &self.positions,
                &self.candidates,
                ballot,
            )
        }

        fn president(&self) -> &Position {
            &self.positions[0]
        }

        fn auditor(&self) -> &Position {
            &self.positions[1]
        }

        fn spec(&self, position: &Position, selections: Vec<Selection>) -> BallotSpec {
            BallotSpec {
                position_id: position.id,
                selections,
            }
        }
    }

    #[test]
    fn candidate_and_abstention() {
        let f = Fixture::new();
        let ana = f.candidates[0].id;
        let ballot = vec![
            f.spec(f.president(), vec![Selection::Candidate(ana)]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];

        let rows = f.flatten(&ballot).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.election_id == f.election_id && r.voter_id == f.voter_id));
        assert_eq!(rows[0].position_id, f.president().id);
        assert_eq!(rows[0].candidate_id, Some(ana));
        assert_eq!(rows[1].position_id, f.auditor().id);
        assert_eq!(rows[1].candidate_id, None);
    }

    #[test]
    fn one_row_per_selection() {
        let mut f = Fixture::new();
        f.positions[0].max = 2;
        let (ana, ben, carla) = (f.candidates[0].id, f.candidates[1].id, f.candidates[2].id);
        let ballot = vec![
            f.spec(
                f.president(),
                vec![Selection::Candidate(ana), Selection::Candidate(ben)],
            ),
            f.spec(f.auditor(), vec![Selection::Candidate(carla)]),
        ];

        let rows = f.flatten(&ballot).unwrap();
        let total_selections: usize = ballot.iter().map(|b| b.selections.len()).sum();
        assert_eq!(rows.len(), total_selections);
        assert_eq!(
            rows.iter().map(|r| r.selection()).collect::<Vec<_>>(),
            ballot
                .iter()
                .flat_map(|b| b.selections.iter().copied())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn every_position_exactly_once() {
        let f = Fixture::new();
        let ana = f.candidates[0].id;

        let missing = vec![f.spec(f.president(), vec![Selection::Candidate(ana)])];
        match f.flatten(&missing) {
            Err(Error::BadRequest(msg)) => assert!(msg.contains("Auditor")),
            other => panic!("expected BadRequest, got {other:?}"),
        }

        let repeated = vec![
            f.spec(f.president(), vec![Selection::Candidate(ana)]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
            f.spec(f.president(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&repeated), Err(Error::BadRequest(_))));
    }

    #[test]
    fn unknown_or_deleted_references() {
        let mut f = Fixture::new();

        let unknown_position = vec![BallotSpec {
            position_id: Id::new(),
            selections: vec![Selection::Abstain],
        }];
        assert!(matches!(
            f.flatten(&unknown_position),
            Err(Error::NotFound(_))
        ));

        let unknown_candidate = vec![
            f.spec(f.president(), vec![Selection::Candidate(Id::new())]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(
            f.flatten(&unknown_candidate),
            Err(Error::NotFound(_))
        ));

        // Carla runs for auditor, not president.
        let carla = f.candidates[2].id;
        let wrong_position = vec![
            f.spec(f.president(), vec![Selection::Candidate(carla)]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(
            f.flatten(&wrong_position),
            Err(Error::NotFound(_))
        ));

        f.candidates[0].lifecycle = Lifecycle::Deleted;
        let ana = f.candidates[0].id;
        let deleted_candidate = vec![
            f.spec(f.president(), vec![Selection::Candidate(ana)]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(
            f.flatten(&deleted_candidate),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn deleted_positions_need_no_answer() {
        let mut f = Fixture::new();
        f.positions[1].lifecycle = Lifecycle::Deleted;
        let ana = f.candidates[0].id;
        let ballot = vec![f.spec(f.president(), vec![Selection::Candidate(ana)])];
        assert_eq!(f.flatten(&ballot).unwrap().len(), 1);
    }

    #[test]
    fn abstention_stands_alone() {
        let f = Fixture::new();
        let ana = f.candidates[0].id;
        let ballot = vec![
            f.spec(
                f.president(),
                vec![Selection::Abstain, Selection::Candidate(ana)],
            ),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&ballot), Err(Error::BadRequest(_))));
    }

    #[test]
    fn selection_count_bounds() {
        let mut f = Fixture::new();
        let (ana, ben) = (f.candidates[0].id, f.candidates[1].id);

        // Empty selections count as zero candidates, below the minimum of one.
        let empty = vec![
            f.spec(f.president(), vec![]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&empty), Err(Error::BadRequest(_))));

        // Max 1.
        let too_many = vec![
            f.spec(
                f.president(),
                vec![Selection::Candidate(ana), Selection::Candidate(ben)],
            ),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&too_many), Err(Error::BadRequest(_))));

        // Min 2, max 2.
        f.positions[0].min = 2;
        f.positions[0].max = 2;
        let too_few = vec![
            f.spec(f.president(), vec![Selection::Candidate(ana)]),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&too_few), Err(Error::BadRequest(_))));

        let duplicate = vec![
            f.spec(
                f.president(),
                vec![Selection::Candidate(ana), Selection::Candidate(ana)],
            ),
            f.spec(f.auditor(), vec![Selection::Abstain]),
        ];
        assert!(matches!(f.flatten(&duplicate), Err(Error::BadRequest(_))));
    }

    #[test]
    fn election_without_positions() {
        let f = Fixture::new();
        let result = flatten_ballot(f.election_id, f.voter_id, &[], &[], &[]);
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    mod db {
        use chrono::TimeZone;
        use mongodb::Database;
        use rocket::local::asynchronous::Client;

        use super::*;
        use crate::model::db::vote::Vote;

        #[backend_test]
        async fn second_ballot_is_rejected(client: Client, db: Database, vote_rows: Coll<Vote>) {
            let db_client = client.rocket().state::<mongodb::Client>().unwrap();
            let f = Fixture::new();
            let ana = f.candidates[0].id;
            let ballot = vec![
                f.spec(f.president(), vec![Selection::Candidate(ana)]),
                f.spec(f.auditor(), vec![Selection::Abstain]),
            ];
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

            let votes = f.flatten(&ballot).unwrap();
            let accepted = record_ballot(db_client, &db, f.election_id, f.voter_id, votes, now)
                .await
                .unwrap();
            assert_eq!(accepted.votes_recorded, 2);
            assert_eq!(accepted.cast_at, now);

            let votes = f.flatten(&ballot).unwrap();
            let second = record_ballot(db_client, &db, f.election_id, f.voter_id, votes, now).await;
            assert!(matches!(second, Err(Error::AlreadyVoted(_))));

            let filter = doc! { "election_id": f.election_id };
            assert_eq!(vote_rows.count_documents(filter, None).await.unwrap(), 2);

            let receipt = find_receipt(&Coll::from_db(&db), f.election_id, f.voter_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(receipt.receipt.cast_at, now);
        }

        #[backend_test]
        async fn receipt_index_rolls_back_votes(
            client: Client,
            db: Database,
            receipts: Coll<NewBallotReceipt>,
            vote_rows: Coll<Vote>,
        ) {
            let db_client = client.rocket().state::<mongodb::Client>().unwrap();
            let f = Fixture::new();
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

            // A receipt without any vote rows, so the recount finds nothing and
            // only the unique index stands in the way.
            let receipt = NewBallotReceipt {
                election_id: f.election_id,
                voter_id: f.voter_id,
                cast_at: now,
            };
            receipts.insert_one(&receipt, None).await.unwrap();

            let ballot = vec![
                f.spec(f.president(), vec![Selection::Abstain]),
                f.spec(f.auditor(), vec![Selection::Abstain]),
            ];
            let votes = f.flatten(&ballot).unwrap();
            let result = record_ballot(db_client, &db, f.election_id, f.voter_id, votes, now).await;
            assert!(matches!(result, Err(Error::AlreadyVoted(_))));

            assert_eq!(vote_rows.count_documents(None, None).await.unwrap(), 0);
            assert_eq!(receipts.count_documents(None, None).await.unwrap(), 1);
        }

        #[backend_test]
        async fn concurrent_ballots_record_once(client: Client, db: Database, vote_rows: Coll<Vote>) {
            let db_client = client.rocket().state::<mongodb::Client>().unwrap();
            let f = Fixture::new();
            let (ana, ben) = (f.candidates[0].id, f.candidates[1].id);
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

            let first = f
                .flatten(&[
                    f.spec(f.president(), vec![Selection::Candidate(ana)]),
                    f.spec(f.auditor(), vec![Selection::Abstain]),
                ])
                .unwrap();
            let second = f
                .flatten(&[
                    f.spec(f.president(), vec![Selection::Candidate(ben)]),
                    f.spec(f.auditor(), vec![Selection::Abstain]),
                ])
                .unwrap();

            let (a, b) = rocket::futures::join!(
                record_ballot(db_client, &db, f.election_id, f.voter_id, first, now),
                record_ballot(db_client, &db, f.election_id, f.voter_id, second, now),
            );
            let results = [a, b];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, Error::AlreadyVoted(_))));

            let filter = doc! { "election_id": f.election_id, "voter_id": f.voter_id };
            assert_eq!(vote_rows.count_documents(filter, None).await.unwrap(), 2);
        }
    }
}
