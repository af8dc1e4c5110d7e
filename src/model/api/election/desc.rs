use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{publicity::Publicity, voting_hours::VotingHours},
    db::{candidate::Candidate, election::Election, partylist::Partylist, position::Position},
    mongodb::Id,
};

/// An API-friendly election description: everything needed to render a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub slug: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub voting_hours: Option<VotingHours>,
    pub publicity: Publicity,
    /// Whether votes are being accepted at the time of the request.
    pub is_ongoing: bool,
    /// Positions in display order.
    pub positions: Vec<PositionDesc>,
    pub partylists: Vec<PartylistDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDesc {
    pub id: ApiId,
    pub name: String,
    pub order: u32,
    pub min: u32,
    pub max: u32,
    pub candidates: Vec<CandidateDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: ApiId,
    pub slug: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub partylist_acronym: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartylistDesc {
    pub id: ApiId,
    pub name: String,
    pub acronym: String,
}

impl ElectionDescription {
    /// Assemble a description from the election's active rows.
    ///
    /// Positions are sorted by display order; candidates keep the order given.
    pub fn new(
        election: Election,
        mut positions: Vec<Position>,
        partylists: Vec<Partylist>,
        candidates: Vec<Candidate>,
        is_ongoing: bool,
    ) -> Self {
        let acronyms: HashMap<Id, &str> = partylists
            .iter()
            .map(|p| (p.id, p.acronym.as_str()))
            .collect();

        positions.sort_by_key(|p| p.order);
        let positions = positions
            .into_iter()
            .map(|position| PositionDesc {
                id: position.id.into(),
                candidates: candidates
                    .iter()
                    .filter(|c| c.position_id == position.id)
                    .map(|c| CandidateDesc {
                        id: c.id.into(),
                        slug: c.slug.clone(),
                        first_name: c.first_name.clone(),
                        middle_name: c.middle_name.clone(),
                        last_name: c.last_name.clone(),
                        partylist_acronym: acronyms
                            .get(&c.partylist_id)
                            .map(|a| a.to_string())
                            .unwrap_or_default(),
                    })
                    .collect(),
                name: position.position.name,
                order: position.position.order,
                min: position.position.min,
                max: position.position.max,
            })
            .collect();

        let partylists = partylists
            .into_iter()
            .map(|p| PartylistDesc {
                id: p.id.into(),
                name: p.partylist.name,
                acronym: p.partylist.acronym,
            })
            .collect();

        Self {
            id: election.id.into(),
            slug: election.election.slug,
            name: election.election.name,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            voting_hours: election.election.voting_hours,
            publicity: election.election.publicity,
            is_ongoing,
            positions,
            partylists,
        }
    }
}
