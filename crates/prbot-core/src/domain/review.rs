//! Validated pull request reviews.

use chrono::{DateTime, Utc};
use prbot_host::ReviewRecord;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// State of a submitted review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    Other(String),
}

impl ReviewState {
    /// Parse the host's state string (`APPROVED`, `CHANGES_REQUESTED`, ...).
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "APPROVED" => ReviewState::Approved,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            "COMMENTED" => ReviewState::Commented,
            "DISMISSED" => ReviewState::Dismissed,
            "PENDING" => ReviewState::Pending,
            _ => ReviewState::Other(raw.to_string()),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewState::Approved)
    }
}

/// A review with every required field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub reviewer: String,
    pub state: ReviewState,
    /// Commit the review was made against.
    pub commit_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl TryFrom<ReviewRecord> for Review {
    type Error = ValidationError;

    fn try_from(record: ReviewRecord) -> Result<Self, Self::Error> {
        let review_id = record.id;
        let missing = |field| ValidationError::MissingReviewField { field, review_id };

        let id = record.id.ok_or_else(|| missing("id"))?;
        let state = record.state.ok_or_else(|| missing("state"))?;
        let commit_id = record.commit_id.ok_or_else(|| missing("commit_id"))?;
        let submitted_at = record.submitted_at.ok_or_else(|| missing("submitted_at"))?;
        let reviewer = record
            .reviewer
            .filter(|login| !login.is_empty())
            .ok_or_else(|| missing("user.login"))?;

        Ok(Review {
            id,
            reviewer,
            state: ReviewState::parse(&state),
            commit_id,
            submitted_at,
        })
    }
}
