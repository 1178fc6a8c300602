//! prbot Core Library
//!
//! Review gate decisions for pull requests: reviewer policy, approval
//! evaluation, approval invalidation after unverified pushes, comment
//! overrides for gated workflows, and stale workflow run pruning.

pub mod approval;
pub mod bot;
pub mod comment_gate;
pub mod commit_verify;
pub mod config;
pub mod deadline;
pub mod domain;
pub mod event;
pub mod invalidate;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod reviews;
pub mod telemetry;
pub mod workflow_runs;

pub use approval::{evaluate, waiting_message, ApprovalOutcome};
pub use bot::Bot;
pub use comment_gate::{authorize_comment, TRIGGER_PHRASE};
pub use commit_verify::{verify_safe_commit, TRUSTED_COMMIT_MARKER};
pub use config::{BotSettings, DEFAULT_DEADLINE};
pub use deadline::with_deadline;
pub use domain::{
    AuthorAssociation, BotError, Comment, CommentRejection, CommitRejection, PolicyViolation,
    PullRequest, PullRequestFields, Result, Review, ReviewState, ValidationError,
};
pub use event::TriggerEvent;
pub use invalidate::{dismiss_message, invalidate_approvals};
pub use metrics::METRICS;
pub use policy::{ReviewerPolicy, ReviewerPolicyConfig};
pub use reviews::{aggregate, AggregatedReviews};
pub use telemetry::init_tracing;
pub use workflow_runs::{
    find_workflow, prune_stale_runs, prune_stale_runs_for_repository, rerun_latest_run,
    PruneReport,
};

/// Version of prbot-core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
