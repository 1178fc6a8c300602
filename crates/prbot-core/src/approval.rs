//! Approval evaluation against a required reviewer set.

use serde::Serialize;

use crate::domain::{PolicyViolation, Result};
use crate::reviews::AggregatedReviews;

/// Result of evaluating reviews against the required reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalOutcome {
    pub approved: bool,
    /// Required reviewers without a current approval, in required order.
    pub waiting_on: Vec<String>,
}

impl ApprovalOutcome {
    /// Human-readable waiting list, `None` once everyone has approved.
    pub fn waiting_message(&self) -> Option<String> {
        waiting_message(&self.waiting_on)
    }

    /// Turn an unmet outcome into the violation that stops a check.
    pub fn into_result(self) -> Result<()> {
        if self.approved {
            return Ok(());
        }
        let message = waiting_message(&self.waiting_on).unwrap_or_default();
        Err(PolicyViolation::AwaitingApprovals {
            waiting_on: self.waiting_on,
            message,
        }
        .into())
    }
}

/// Check that every required reviewer's current review is an approval.
///
/// A pull request with no reviews at all is a violation of its own.
pub fn evaluate(reviews: &AggregatedReviews, required: &[String]) -> Result<ApprovalOutcome> {
    if reviews.is_empty() {
        return Err(PolicyViolation::NoReviews.into());
    }

    let waiting_on: Vec<String> = required
        .iter()
        .filter(|login| {
            !reviews
                .get(login.as_str())
                .map(|r| r.state.is_approved())
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    Ok(ApprovalOutcome {
        approved: waiting_on.is_empty(),
        waiting_on,
    })
}

/// Compose the waiting list as a sentence.
pub fn waiting_message(waiting_on: &[String]) -> Option<String> {
    match waiting_on {
        [] => None,
        [one] => Some(format!("waiting on an approval from {one}")),
        [first, second] => Some(format!("waiting for approvals from {first} and {second}")),
        [init @ .., last] => Some(format!(
            "waiting for approvals from {}, and {last}",
            init.join(", ")
        )),
    }
}
