use serde::Deserialize;

use crate::model::mongodb::Id;

/// One choice made by a voter for one position.
///
/// In JSON, a candidate vote is `{"candidate": "<id>"}` and an abstention is `"abstain"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Candidate(Id),
    Abstain,
}

impl Selection {
    pub fn candidate(&self) -> Option<Id> {
        match self {
            Self::Candidate(id) => Some(*id),
            Self::Abstain => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn selection_from_json() {
        let id = Id::new();
        let raw = format!(r#"[{{"candidate": "{id}"}}, "abstain"]"#);
        let selections: Vec<Selection> = serde_json::from_str(&raw).unwrap();
        assert_eq!(selections, vec![Selection::Candidate(id), Selection::Abstain]);
    }

    #[test]
    fn abstain_is_not_a_candidate_id() {
        // `abstain` is not a valid candidate ID.
        let result = serde_json::from_str::<Selection>(r#"{"candidate": "abstain"}"#);
        assert!(result.is_err());
    }
}
