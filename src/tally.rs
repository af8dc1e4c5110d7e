//! Vote aggregation and the disclosure rule.

use std::collections::HashMap;

use log::debug;
use mongodb::{
    bson::{doc, from_document},
    options::{FindOptions, SessionOptions},
    Client, ClientSession, Database,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::error::Result;
use crate::model::{
    api::results::{CandidateResult, ElectionResults, PositionResults},
    common::lifecycle::only_active,
    db::{candidate::Candidate, partylist::Partylist, position::Position, vote::Vote},
    mongodb::{Coll, Id, MongoCollection},
};

/// Number of vote rows per `(position_id, candidate_id)`; `None` counts abstentions.
pub type VoteCounts = HashMap<(Id, Option<Id>), u64>;

/// The active rows of an election, each list in creation order.
#[derive(Debug, Clone, Default)]
pub struct ElectionContents {
    pub positions: Vec<Position>,
    pub candidates: Vec<Candidate>,
    pub partylists: Vec<Partylist>,
}

impl ElectionContents {
    /// Load every active position, candidate and partylist of an election.
    pub async fn load(db: &Database, election_id: Id) -> Result<Self> {
        Ok(Self {
            positions: find_active(&Coll::from_db(db), election_id, None).await?,
            candidates: find_active(&Coll::from_db(db), election_id, None).await?,
            partylists: find_active(&Coll::from_db(db), election_id, None).await?,
        })
    }
}

/// Compute results from already-loaded contents and vote counts.
///
/// Positions come out in display order. Within a position candidates are ranked by
/// descending vote count; ties keep the order of `contents.candidates`. While the
/// election is ongoing, candidates are labelled "Candidate 1".."Candidate N" in
/// ranked order and their names are left empty.
pub fn tally(contents: &ElectionContents, counts: &VoteCounts, is_ongoing: bool) -> ElectionResults {
    let acronyms: HashMap<Id, &str> = contents
        .partylists
        .iter()
        .map(|p| (p.id, p.acronym.as_str()))
        .collect();

    let mut positions = contents
        .positions
        .iter()
        .filter(|p| p.lifecycle.is_active())
        .collect::<Vec<_>>();
    positions.sort_by_key(|p| p.order);

    let positions = positions
        .into_iter()
        .map(|position| {
            let total_votes = counts
                .iter()
                .filter(|((position_id, _), _)| *position_id == position.id)
                .map(|(_, count)| count)
                .sum();
            let abstentions = counts.get(&(position.id, None)).copied().unwrap_or(0);

            let mut ranked = contents
                .candidates
                .iter()
                .filter(|c| c.position_id == position.id && c.lifecycle.is_active())
                .map(|c| {
                    let votes = counts.get(&(position.id, Some(c.id))).copied().unwrap_or(0);
                    (c, votes)
                })
                .collect::<Vec<_>>();
            // Stable: equal counts keep their input order.
            ranked.sort_by(|(_, a), (_, b)| b.cmp(a));

            let candidates = ranked
                .into_iter()
                .enumerate()
                .map(|(rank, (candidate, vote_count))| {
                    let partylist_acronym = acronyms
                        .get(&candidate.partylist_id)
                        .copied()
                        .unwrap_or_default()
                        .to_string();
                    if is_ongoing {
                        CandidateResult {
                            id: candidate.id.into(),
                            display_name: format!("Candidate {}", rank + 1),
                            first_name: String::new(),
                            middle_name: String::new(),
                            last_name: String::new(),
                            partylist_acronym,
                            vote_count,
                        }
                    } else {
                        CandidateResult {
                            id: candidate.id.into(),
                            display_name: candidate.full_name(),
                            first_name: candidate.first_name.clone(),
                            middle_name: candidate.middle_name.clone().unwrap_or_default(),
                            last_name: candidate.last_name.clone(),
                            partylist_acronym,
                            vote_count,
                        }
                    }
                })
                .collect();

            PositionResults {
                id: position.id.into(),
                name: position.name.clone(),
                total_votes,
                abstentions,
                candidates,
            }
        })
        .collect();

    ElectionResults { positions }
}

/// Shape of one group out of the counting pipeline.
#[derive(Debug, Deserialize)]
struct CountGroup {
    #[serde(rename = "_id")]
    key: CountKey,
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CountKey {
    position_id: Id,
    candidate_id: Option<Id>,
}

/// Count an election's vote rows per position and candidate.
pub async fn count_votes(
    votes: &Coll<Vote>,
    election_id: Id,
    session: Option<&mut ClientSession>,
) -> Result<VoteCounts> {
    let pipeline = vec![
        doc! { "$match": { "election_id": election_id } },
        doc! {
            "$group": {
                "_id": { "position_id": "$position_id", "candidate_id": "$candidate_id" },
                "count": { "$sum": 1 },
            }
        },
    ];

    let mut counts = VoteCounts::new();
    let mut record = |group: mongodb::bson::Document| -> Result<()> {
        let group: CountGroup = from_document(group)?;
        counts.insert((group.key.position_id, group.key.candidate_id), group.count);
        Ok(())
    };
    match session {
        Some(session) => {
            let mut cursor = votes.aggregate_with_session(pipeline, None, session).await?;
            while let Some(group) = cursor.next(session).await {
                record(group?)?;
            }
        }
        None => {
            let mut cursor = votes.aggregate(pipeline, None).await?;
            while let Some(group) = rocket::futures::TryStreamExt::try_next(&mut cursor).await? {
                record(group)?;
            }
        }
    }
    Ok(counts)
}

/// Compute an election's current results from a consistent snapshot of the database.
pub async fn election_results(
    db_client: &Client,
    db: &Database,
    election_id: Id,
    is_ongoing: bool,
) -> Result<ElectionResults> {
    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let contents = ElectionContents {
        positions: find_active(&Coll::from_db(db), election_id, Some(&mut session)).await?,
        candidates: find_active(&Coll::from_db(db), election_id, Some(&mut session)).await?,
        partylists: find_active(&Coll::from_db(db), election_id, Some(&mut session)).await?,
    };
    let counts = count_votes(&Coll::from_db(db), election_id, Some(&mut session)).await?;

    let results = tally(&contents, &counts, is_ongoing);
    debug!(
        "Tallied {} positions of election {election_id} (ongoing: {is_ongoing})",
        results.positions.len()
    );
    Ok(results)
}

/// All active rows of a collection belonging to one election, in creation order.
async fn find_active<T>(
    coll: &Coll<T>,
    election_id: Id,
    session: Option<&mut ClientSession>,
) -> Result<Vec<T>>
where
    T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
{
    let filter = only_active(doc! { "election_id": election_id });
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

    let mut rows = Vec::new();
    match session {
        Some(session) => {
            let mut cursor = coll.find_with_session(filter, options, session).await?;
            while let Some(row) = cursor.next(session).await {
                rows.push(row?);
            }
        }
        None => {
            let mut cursor = coll.find(filter, options).await?;
            while let Some(row) = rocket::futures::TryStreamExt::try_next(&mut cursor).await? {
                rows.push(row);
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{common::lifecycle::Lifecycle, db::partylist::PartylistCore};

    struct Fixture {
        contents: ElectionContents,
        counts: VoteCounts,
    }

    impl Fixture {
        /// President: A, B, C (created in that order). Auditor: D.
        fn new() -> Self {
            let election_id = Id::new();
            let mut party = Partylist {
                id: Id::new(),
                partylist: PartylistCore::independent(election_id),
            };
            party.acronym = "SAMAHAN".to_string();
            // Listed after the president so display order, not creation order, applies.
            let auditor = Position::example(election_id, "Auditor", 2);
            let president = Position::example(election_id, "President", 1);
            let candidates = vec![
                Candidate::example(president.id, party.id, "Alice", "Aquino"),
                Candidate::example(president.id, party.id, "Bea", "Bautista"),
                Candidate::example(president.id, party.id, "Cris", "Cruz"),
                Candidate::example(auditor.id, party.id, "Dan", "Diaz"),
            ];

            let mut counts = VoteCounts::new();
            counts.insert((president.id, Some(candidates[0].id)), 5);
            counts.insert((president.id, Some(candidates[1].id)), 9);
            counts.insert((president.id, Some(candidates[2].id)), 9);
            counts.insert((president.id, None), 2);
            counts.insert((auditor.id, Some(candidates[3].id)), 20);
            counts.insert((auditor.id, None), 5);

            Self {
                contents: ElectionContents {
                    positions: vec![auditor, president],
                    candidates,
                    partylists: vec![party],
                },
                counts,
            }
        }
    }

    #[test]
    fn ranking_is_stable() {
        let f = Fixture::new();
        let results = tally(&f.contents, &f.counts, false);

        let president = &results.positions[0];
        assert_eq!(president.name, "President");
        let names = president
            .candidates
            .iter()
            .map(|c| c.first_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Bea", "Cris", "Alice"]);
        assert_eq!(
            president
                .candidates
                .iter()
                .map(|c| c.vote_count)
                .collect::<Vec<_>>(),
            vec![9, 9, 5]
        );
    }

    #[test]
    fn totals_include_abstentions() {
        let f = Fixture::new();
        let results = tally(&f.contents, &f.counts, false);

        assert_eq!(results.positions[0].total_votes, 25);
        assert_eq!(results.positions[0].abstentions, 2);
        assert_eq!(results.positions[1].name, "Auditor");
        assert_eq!(results.positions[1].total_votes, 25);
        assert_eq!(results.positions[1].abstentions, 5);
    }

    #[test]
    fn ongoing_results_hide_names() {
        let f = Fixture::new();
        let results = tally(&f.contents, &f.counts, true);

        let president = &results.positions[0];
        let labels = president
            .candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Candidate 1", "Candidate 2", "Candidate 3"]);

        let real_names = ["Alice", "Bea", "Cris", "Dan"];
        for candidate in results.positions.iter().flat_map(|p| &p.candidates) {
            assert!(candidate.first_name.is_empty());
            assert!(candidate.middle_name.is_empty());
            assert!(candidate.last_name.is_empty());
            assert!(!real_names
                .iter()
                .any(|name| candidate.display_name.contains(name)));
            // Counts and partylists stay visible.
            assert_eq!(candidate.partylist_acronym, "SAMAHAN");
        }
        assert_eq!(president.candidates[0].vote_count, 9);
    }

    #[test]
    fn finished_results_show_names() {
        let f = Fixture::new();
        let results = tally(&f.contents, &f.counts, false);

        let winner = &results.positions[0].candidates[0];
        assert_eq!(winner.display_name, "Bea Bautista");
        assert_eq!(winner.last_name, "Bautista");
        assert_eq!(*winner.id, f.contents.candidates[1].id);
    }

    #[test]
    fn tally_is_idempotent() {
        let f = Fixture::new();
        assert_eq!(
            tally(&f.contents, &f.counts, false),
            tally(&f.contents, &f.counts, false)
        );
        assert_eq!(
            tally(&f.contents, &f.counts, true),
            tally(&f.contents, &f.counts, true)
        );
    }

    #[test]
    fn no_votes_yet() {
        let f = Fixture::new();
        let results = tally(&f.contents, &VoteCounts::new(), true);
        for position in &results.positions {
            assert_eq!(position.total_votes, 0);
            assert_eq!(position.abstentions, 0);
            assert!(position.candidates.iter().all(|c| c.vote_count == 0));
        }
    }

    #[test]
    fn deleted_rows_are_skipped() {
        let mut f = Fixture::new();
        f.contents.candidates[0].lifecycle = Lifecycle::Deleted;
        f.contents.positions[0].lifecycle = Lifecycle::Deleted;

        let results = tally(&f.contents, &f.counts, false);
        assert_eq!(results.positions.len(), 1);
        assert_eq!(results.positions[0].candidates.len(), 2);
        // Rows already cast for the deleted candidate still count toward the total.
        assert_eq!(results.positions[0].total_votes, 25);
    }
}
