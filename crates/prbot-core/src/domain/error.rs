//! Domain-level error taxonomy for prbot.

use std::time::Duration;

use prbot_host::HostError;

/// Malformed or incomplete data received from the host or the event payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("review is missing required field {field} (review id: {review_id:?})")]
    MissingReviewField {
        field: &'static str,
        review_id: Option<u64>,
    },

    #[error("comment is missing required field {field} (comment id: {comment_id:?})")]
    MissingCommentField {
        field: &'static str,
        comment_id: Option<u64>,
    },

    #[error("missing {field}")]
    MissingPullRequestField { field: &'static str },

    #[error("invalid event payload: {0}")]
    InvalidEventPayload(String),
}

/// Why a new head commit was not accepted as safe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitRejection {
    #[error("detected file change ({changed_files} file(s) differ)")]
    FilesChanged { changed_files: usize },

    #[error("commit {sha} has no verification metadata")]
    MissingVerification { sha: String },

    #[error("commit {sha} is not verified and/or is not signed by the trusted host identity")]
    UntrustedSignature { sha: String },
}

/// Why a comment did not authorize a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommentRejection {
    #[error("comment was made on commit {comment_sha}, not the current head {head_sha}")]
    StaleCommit {
        comment_sha: String,
        head_sha: String,
    },

    #[error("comment body does not contain {phrase:?}")]
    MissingTriggerPhrase { phrase: String },

    #[error("commenter {login} is {association}, not OWNER")]
    NotOwner { login: String, association: String },

    #[error("commenter {login} is not an admin reviewer")]
    NotAdmin { login: String },

    #[error("comment is dated in the future ({created_at})")]
    FutureDated { created_at: String },
}

/// Expected business outcomes that stop a check without indicating a fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("pull request has no reviews")]
    NoReviews,

    #[error("required reviewers have not yet approved, {message}")]
    AwaitingApprovals {
        waiting_on: Vec<String>,
        message: String,
    },

    #[error("new commit rejected: {0}")]
    UnsafeCommit(CommitRejection),

    #[error("comment does not authorize run: {0}")]
    CommentNotAuthorized(CommentRejection),

    #[error("workflow runs have not been approved for this pull request ({} comment(s) rejected)", rejections.len())]
    RunNotApproved { rejections: Vec<CommentRejection> },
}

/// prbot domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("{0}")]
    Policy(#[from] PolicyViolation),

    #[error("host call {operation} failed: {source}")]
    Host {
        operation: &'static str,
        #[source]
        source: HostError,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },
}

impl BotError {
    /// Wrap a host failure with the name of the operation that made the call.
    pub fn host(operation: &'static str) -> impl FnOnce(HostError) -> BotError {
        move |source| BotError::Host { operation, source }
    }

    /// Whether this is an expected policy outcome rather than a fault.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, BotError::Policy(_))
    }

    pub fn policy_violation(&self) -> Option<&PolicyViolation> {
        match self {
            BotError::Policy(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type for prbot domain operations.
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_approvals_display_carries_message() {
        let err = BotError::from(PolicyViolation::AwaitingApprovals {
            waiting_on: vec!["alice".to_string()],
            message: "waiting on an approval from alice".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "required reviewers have not yet approved, waiting on an approval from alice"
        );
        assert!(err.is_policy_violation());
    }

    #[test]
    fn host_error_names_operation() {
        let err = BotError::host("delete_workflow_run")(HostError::Network("reset".into()));
        let msg = err.to_string();
        assert!(msg.contains("delete_workflow_run"));
        assert!(msg.contains("reset"));
        assert!(!err.is_policy_violation());
    }

    #[test]
    fn validation_error_names_field() {
        let err = BotError::from(ValidationError::MissingReviewField {
            field: "submitted_at",
            review_id: Some(3),
        });
        assert!(err.to_string().contains("submitted_at"));
    }

    #[test]
    fn run_not_approved_counts_rejections() {
        let v = PolicyViolation::RunNotApproved {
            rejections: vec![CommentRejection::NotAdmin {
                login: "random-user".into(),
            }],
        };
        assert!(v.to_string().contains("1 comment(s) rejected"));
    }
}
