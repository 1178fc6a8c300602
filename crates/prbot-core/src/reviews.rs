//! Review aggregation: one current review per reviewer.

use std::collections::BTreeMap;

use prbot_host::ReviewRecord;

use crate::domain::{Result, Review};

/// The most recent review of each reviewer, keyed by login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedReviews {
    by_reviewer: BTreeMap<String, Review>,
}

/// Validate every record, then keep the latest review per reviewer.
///
/// A single malformed record fails the whole batch. Reviews submitted at the
/// same instant resolve to whichever the host listed last.
pub fn aggregate(records: Vec<ReviewRecord>) -> Result<AggregatedReviews> {
    let reviews = records
        .into_iter()
        .map(Review::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_reviewer: BTreeMap<String, Review> = BTreeMap::new();
    for review in reviews {
        match by_reviewer.get(&review.reviewer) {
            Some(current) if review.submitted_at < current.submitted_at => {}
            _ => {
                by_reviewer.insert(review.reviewer.clone(), review);
            }
        }
    }
    Ok(AggregatedReviews { by_reviewer })
}

impl AggregatedReviews {
    /// Whether any current review was made against a commit other than `head_sha`.
    pub fn has_new_commit(&self, head_sha: &str) -> bool {
        self.by_reviewer.values().any(|r| r.commit_id != head_sha)
    }

    /// Current reviews in the approved state.
    pub fn approved(&self) -> impl Iterator<Item = &Review> {
        self.by_reviewer.values().filter(|r| r.state.is_approved())
    }

    pub fn get(&self, login: &str) -> Option<&Review> {
        self.by_reviewer.get(login)
    }

    pub fn len(&self) -> usize {
        self.by_reviewer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reviewer.is_empty()
    }

    /// Iterate in login order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Review)> {
        self.by_reviewer.iter().map(|(k, v)| (k.as_str(), v))
    }
}
