mod desc;
mod spec;

pub use desc::{CandidateDesc, ElectionDescription, PartylistDesc, PositionDesc};
pub(crate) use spec::order_template;
pub use spec::{
    CandidateSpec, ElectionSpec, PartylistSpec, PositionSpec, VotersSpec, RESERVED_SLUGS,
};
