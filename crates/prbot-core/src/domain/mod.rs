//! Domain models for prbot.
//!
//! Canonical definitions for the entities every check works with:
//! - `PullRequest`: the immutable pull request in the current context
//! - `Review`: a validated review
//! - `Comment`: a validated review comment

pub mod comment;
pub mod error;
pub mod pull_request;
pub mod review;

// Re-export main types and errors
pub use comment::{AuthorAssociation, Comment};
pub use error::{
    BotError, CommentRejection, CommitRejection, PolicyViolation, Result, ValidationError,
};
pub use pull_request::{PullRequest, PullRequestFields};
pub use review::{Review, ReviewState};
