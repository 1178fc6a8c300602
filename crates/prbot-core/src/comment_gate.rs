//! Comment override gate.
//!
//! Workflows for external contributors stay gated until an admin comments
//! the trigger phrase on the current head commit.

use chrono::{DateTime, Utc};

use crate::domain::{AuthorAssociation, Comment, CommentRejection, PullRequest};
use crate::policy::ReviewerPolicy;

/// Phrase a comment must contain to release gated workflows.
pub const TRIGGER_PHRASE: &str = "run ci";

/// Check one comment against the gate.
///
/// Checks run in a fixed order and the first failure is reported: head
/// commit, trigger phrase, OWNER association, admin membership, then (only
/// when `now` is given) that the comment is not dated in the future.
pub fn authorize_comment(
    pr: &PullRequest,
    policy: &ReviewerPolicy,
    now: Option<DateTime<Utc>>,
    comment: &Comment,
    phrase: &str,
) -> Result<(), CommentRejection> {
    if comment.commit_id != pr.head_sha() {
        return Err(CommentRejection::StaleCommit {
            comment_sha: comment.commit_id.clone(),
            head_sha: pr.head_sha().to_string(),
        });
    }
    if !comment.body.contains(phrase) {
        return Err(CommentRejection::MissingTriggerPhrase {
            phrase: phrase.to_string(),
        });
    }
    if comment.author_association != AuthorAssociation::Owner {
        return Err(CommentRejection::NotOwner {
            login: comment.commenter.clone(),
            association: comment.author_association.to_string(),
        });
    }
    if !policy.is_admin(&comment.commenter) {
        return Err(CommentRejection::NotAdmin {
            login: comment.commenter.clone(),
        });
    }
    if let Some(now) = now {
        if comment.created_at > now {
            return Err(CommentRejection::FutureDated {
                created_at: comment.created_at.to_rfc3339(),
            });
        }
    }
    Ok(())
}
