//! Structured lifecycle events for bot decisions.
//!
//! `PullRequestSpan` tags everything logged while it is alive with the pull
//! request coordinates. The `emit_*` functions log one event per decision
//! point at `info!` (or `warn!` for failures).

use tracing::{info, warn};

use crate::domain::PullRequest;

/// RAII guard that enters a span scoped to one pull request.
pub struct PullRequestSpan {
    _span: tracing::span::EnteredSpan,
}

impl PullRequestSpan {
    pub fn enter(operation: &'static str, pr: &PullRequest) -> Self {
        let span = tracing::info_span!(
            "prbot.pull_request",
            operation,
            repo = %format_args!("{}/{}", pr.repo_owner(), pr.repo_name()),
            number = pr.number(),
            author = %pr.author(),
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_check_started(pr: &PullRequest, internal: bool) {
    info!(event = "check.started", pr = %pr, internal = internal);
}

pub fn emit_approval_evaluated(pr: &PullRequest, approved: bool, waiting_on: &[String]) {
    info!(
        event = "approval.evaluated",
        pr = %pr,
        approved = approved,
        waiting_on = ?waiting_on,
    );
}

pub fn emit_commit_rejected(pr: &PullRequest, reason: &dyn std::fmt::Display) {
    warn!(event = "commit.rejected", pr = %pr, head = %pr.head_sha(), reason = %reason);
}

pub fn emit_reviews_dismissed(pr: &PullRequest, count: usize) {
    info!(event = "reviews.dismissed", pr = %pr, count = count);
}

pub fn emit_reviewers_requested(pr: &PullRequest, reviewers: &[String]) {
    info!(event = "reviewers.requested", pr = %pr, reviewers = ?reviewers);
}

pub fn emit_run_deleted(owner: &str, repo: &str, branch: &str, run_id: u64) {
    info!(
        event = "run.deleted",
        repo = %format_args!("{owner}/{repo}"),
        branch = %branch,
        run_id = run_id,
    );
}

pub fn emit_run_rerun(owner: &str, repo: &str, workflow: &str, run_id: u64) {
    info!(
        event = "run.rerun",
        repo = %format_args!("{owner}/{repo}"),
        workflow = %workflow,
        run_id = run_id,
    );
}

pub fn emit_comment_authorized(pr: &PullRequest, commenter: &str) {
    info!(event = "comment.authorized", pr = %pr, commenter = %commenter);
}
