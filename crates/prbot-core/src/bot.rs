//! The review gate engine.
//!
//! `Bot` ties the reviewer policy, the settings and a repository host
//! together. Every operation recomputes its decision from freshly fetched
//! host state; nothing is cached between calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prbot_host::RepositoryHost;
use tracing::{debug, info};

use crate::approval::{evaluate, ApprovalOutcome};
use crate::comment_gate;
use crate::commit_verify::verify_safe_commit;
use crate::config::BotSettings;
use crate::domain::{
    BotError, Comment, CommentRejection, PolicyViolation, PullRequest, Result,
};
use crate::invalidate::invalidate_approvals;
use crate::metrics::METRICS;
use crate::obs::{self, PullRequestSpan};
use crate::policy::ReviewerPolicy;
use crate::reviews::aggregate;
use crate::workflow_runs::{self, PruneReport};

pub struct Bot {
    host: Arc<dyn RepositoryHost>,
    policy: ReviewerPolicy,
    settings: BotSettings,
}

impl Bot {
    pub fn new(host: Arc<dyn RepositoryHost>, policy: ReviewerPolicy, settings: BotSettings) -> Self {
        Self {
            host,
            policy,
            settings,
        }
    }

    pub fn host(&self) -> &dyn RepositoryHost {
        self.host.as_ref()
    }

    /// Request review from the author's required reviewers.
    ///
    /// The author is never asked to review their own pull request. Returns
    /// the logins that were requested.
    pub async fn assign(&self, pr: &PullRequest) -> Result<Vec<String>> {
        let _span = PullRequestSpan::enter("assign", pr);
        let reviewers: Vec<String> = self
            .policy
            .required_reviewers_for(pr.author())
            .iter()
            .filter(|r| r.as_str() != pr.author())
            .cloned()
            .collect();
        if reviewers.is_empty() {
            debug!("no reviewers to request");
            return Ok(reviewers);
        }

        self.host
            .request_reviewers(pr.repo_owner(), pr.repo_name(), pr.number(), &reviewers)
            .await
            .map_err(BotError::host("request_reviewers"))?;
        obs::emit_reviewers_requested(pr, &reviewers);
        Ok(reviewers)
    }

    /// Enforce the review requirements on the pull request.
    ///
    /// For internal authors, stale runs of the check workflow are pruned
    /// first. Unmet approvals fail with [`PolicyViolation::AwaitingApprovals`].
    /// When an external author's head moved past the reviewed commit and the
    /// new commit is not a host-signed branch update, every approval is
    /// dismissed and the commit rejection is returned. A failed dismissal
    /// is returned instead of the rejection.
    pub async fn check(&self, pr: &PullRequest) -> Result<ApprovalOutcome> {
        let _span = PullRequestSpan::enter("check", pr);
        METRICS.inc_checks();
        let internal = self.policy.is_internal(pr.author());
        obs::emit_check_started(pr, internal);

        if internal {
            self.prune_stale_runs(pr).await?;
        }

        let records = self
            .host
            .list_reviews(pr.repo_owner(), pr.repo_name(), pr.number())
            .await
            .map_err(BotError::host("list_reviews"))?;
        let reviews = aggregate(records)?;
        let required = self.policy.required_reviewers_for(pr.author());

        let outcome = evaluate(&reviews, required)?;
        obs::emit_approval_evaluated(pr, outcome.approved, &outcome.waiting_on);
        outcome.clone().into_result()?;

        if !internal && reviews.has_new_commit(pr.head_sha()) {
            if let Err(err) =
                verify_safe_commit(self.host(), pr, &self.settings.trusted_commit_marker).await
            {
                if err.is_policy_violation() {
                    obs::emit_commit_rejected(pr, &err);
                    let dismissed =
                        invalidate_approvals(self.host(), pr, &reviews, required).await?;
                    METRICS.add_reviews_dismissed(dismissed as u64);
                    obs::emit_reviews_dismissed(pr, dismissed);
                }
                return Err(err);
            }
        }

        Ok(outcome)
    }

    /// Check a single comment against the override gate.
    ///
    /// A rejection surfaces as [`PolicyViolation::CommentNotAuthorized`].
    pub fn authorize_comment(
        &self,
        pr: &PullRequest,
        now: Option<DateTime<Utc>>,
        comment: &Comment,
    ) -> Result<()> {
        self.gate_comment(pr, now, comment)
            .map_err(|rejection| BotError::from(PolicyViolation::CommentNotAuthorized(rejection)))
    }

    fn gate_comment(
        &self,
        pr: &PullRequest,
        now: Option<DateTime<Utc>>,
        comment: &Comment,
    ) -> std::result::Result<(), CommentRejection> {
        comment_gate::authorize_comment(
            pr,
            &self.policy,
            now,
            comment,
            &self.settings.trigger_phrase,
        )
    }

    /// Whether gated workflows may run for this pull request.
    ///
    /// Internal authors always may. Otherwise some comment on the pull
    /// request has to pass the override gate.
    pub async fn has_workflow_run_approval(&self, pr: &PullRequest) -> Result<()> {
        let _span = PullRequestSpan::enter("has_workflow_run_approval", pr);
        if self.policy.is_internal(pr.author()) {
            debug!("internal author, no approval needed");
            return Ok(());
        }

        let records = self
            .host
            .list_comments(pr.repo_owner(), pr.repo_name(), pr.number())
            .await
            .map_err(BotError::host("list_comments"))?;
        let now = self.settings.enforce_comment_timing.then(Utc::now);

        let mut rejections = Vec::new();
        for record in records {
            let comment = Comment::try_from(record)?;
            match self.gate_comment(pr, now, &comment) {
                Ok(()) => {
                    METRICS.inc_comments_authorized();
                    obs::emit_comment_authorized(pr, &comment.commenter);
                    return Ok(());
                }
                Err(rejection) => {
                    debug!(commenter = %comment.commenter, reason = %rejection, "comment rejected");
                    rejections.push(rejection);
                }
            }
        }
        info!(rejected = rejections.len(), "no comment authorizes the run");
        Err(PolicyViolation::RunNotApproved { rejections }.into())
    }

    /// Prune stale check workflow runs on the pull request's branch.
    pub async fn prune_stale_runs(&self, pr: &PullRequest) -> Result<PruneReport> {
        workflow_runs::prune_stale_runs(
            self.host(),
            pr.repo_owner(),
            pr.repo_name(),
            pr.branch_name(),
            &self.settings.check_workflow,
        )
        .await
    }

    /// Prune stale check workflow runs for every open pull request.
    pub async fn prune_stale_runs_for_repository(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<(u64, PruneReport)>> {
        workflow_runs::prune_stale_runs_for_repository(
            self.host(),
            owner,
            repo,
            &self.settings.check_workflow,
        )
        .await
    }

    /// Re-run the latest check run, then the latest assign run.
    pub async fn rerun_workflows(&self, pr: &PullRequest) -> Result<Vec<u64>> {
        let _span = PullRequestSpan::enter("rerun_workflows", pr);
        let mut rerun = Vec::with_capacity(2);
        for workflow in [&self.settings.check_workflow, &self.settings.assign_workflow] {
            let id = workflow_runs::rerun_latest_run(
                self.host(),
                pr.repo_owner(),
                pr.repo_name(),
                workflow,
            )
            .await?;
            rerun.push(id);
        }
        Ok(rerun)
    }
}
