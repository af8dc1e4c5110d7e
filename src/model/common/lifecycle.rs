use mongodb::bson::{doc, to_bson, Bson, Document};
use serde::{Deserialize, Serialize};

/// Lifecycle of a soft-deletable row. Rows are never hard-deleted under normal
/// operation; every read path must filter on [`Lifecycle::Active`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted,
}

impl Lifecycle {
    /// A filter matching only active rows.
    pub fn active() -> Document {
        doc! { "lifecycle": Lifecycle::Active }
    }

    /// An update that soft-deletes the matched rows.
    pub fn delete() -> Document {
        doc! { "$set": { "lifecycle": Lifecycle::Deleted } }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl From<Lifecycle> for Bson {
    fn from(lifecycle: Lifecycle) -> Self {
        to_bson(&lifecycle).expect("Serialisation is infallible")
    }
}

/// Add the active-rows condition to an existing filter.
pub fn only_active(mut filter: Document) -> Document {
    filter.insert("lifecycle", Lifecycle::Active);
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_extends_filter() {
        let filter = only_active(doc! { "slug": "student-council" });
        assert_eq!(
            filter,
            doc! { "slug": "student-council", "lifecycle": "Active" }
        );
    }
}
