//! Stale workflow run reconciliation.
//!
//! For a (repository, branch, workflow) key only the most recent run is
//! meaningful; older runs are deleted so that their stale results cannot
//! satisfy branch protection.

use prbot_host::{RepositoryHost, Workflow, WorkflowRun};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{BotError, PullRequest, Result};
use crate::metrics::METRICS;
use crate::obs;

/// What a prune pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Run that was left in place, if any run existed.
    pub kept: Option<u64>,
    /// Runs deleted, oldest first.
    pub deleted: Vec<u64>,
}

/// Look up a workflow by its display name.
pub async fn find_workflow(
    host: &dyn RepositoryHost,
    owner: &str,
    repo: &str,
    name: &str,
) -> Result<Workflow> {
    let workflows = host
        .list_workflows(owner, repo)
        .await
        .map_err(BotError::host("list_workflows"))?;
    workflows
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| BotError::NotFound {
            resource: format!("workflow {name:?} in {owner}/{repo}"),
        })
}

/// Order runs oldest first. Runs created at the same instant keep host order.
fn sort_by_creation(runs: &mut [WorkflowRun]) {
    runs.sort_by_key(|r| r.created_at);
}

/// Delete every run of `workflow` on `branch` except the most recent.
///
/// The first failed deletion aborts the pass. Running it again once it has
/// succeeded deletes nothing.
pub async fn prune_stale_runs(
    host: &dyn RepositoryHost,
    owner: &str,
    repo: &str,
    branch: &str,
    workflow: &str,
) -> Result<PruneReport> {
    let workflow = find_workflow(host, owner, repo, workflow).await?;
    let mut runs = host
        .list_workflow_runs(owner, repo, workflow.id, Some(branch))
        .await
        .map_err(BotError::host("list_workflow_runs"))?;
    // Hosts are not trusted to honour the branch filter.
    runs.retain(|r| r.head_branch.as_deref() == Some(branch));
    sort_by_creation(&mut runs);

    let Some(latest) = runs.pop() else {
        debug!(branch, workflow = %workflow.name, "no runs to prune");
        return Ok(PruneReport::default());
    };

    let mut deleted = Vec::with_capacity(runs.len());
    for run in &runs {
        host.delete_workflow_run(owner, repo, run.id)
            .await
            .map_err(BotError::host("delete_workflow_run"))?;
        METRICS.inc_runs_deleted();
        obs::emit_run_deleted(owner, repo, branch, run.id);
        deleted.push(run.id);
    }

    Ok(PruneReport {
        kept: Some(latest.id),
        deleted,
    })
}

/// Re-run the most recent run of `workflow`, on any branch.
pub async fn rerun_latest_run(
    host: &dyn RepositoryHost,
    owner: &str,
    repo: &str,
    workflow: &str,
) -> Result<u64> {
    let found = find_workflow(host, owner, repo, workflow).await?;
    let mut runs = host
        .list_workflow_runs(owner, repo, found.id, None)
        .await
        .map_err(BotError::host("list_workflow_runs"))?;
    sort_by_creation(&mut runs);

    let latest = runs.last().ok_or_else(|| BotError::NotFound {
        resource: format!("runs of workflow {workflow:?} in {owner}/{repo}"),
    })?;
    host.rerun_workflow_run(owner, repo, latest.id)
        .await
        .map_err(BotError::host("rerun_workflow_run"))?;
    METRICS.inc_runs_rerun();
    obs::emit_run_rerun(owner, repo, workflow, latest.id);
    Ok(latest.id)
}

/// Prune stale runs of `workflow` for every open pull request, one at a time.
///
/// Each pull request is pruned on its own branch within the base
/// repository. Runs are matched by branch name only, so fork pull requests
/// sharing a head ref (say two `patch-1` branches) share one run set and
/// only the newest run across them survives. The first failure aborts the
/// sweep and names the pull request.
pub async fn prune_stale_runs_for_repository(
    host: &dyn RepositoryHost,
    owner: &str,
    repo: &str,
    workflow: &str,
) -> Result<Vec<(u64, PruneReport)>> {
    let records = host
        .list_open_pull_requests(owner, repo)
        .await
        .map_err(BotError::host("list_open_pull_requests"))?;
    info!(count = records.len(), repo = %format_args!("{owner}/{repo}"), "sweeping open pull requests");

    let mut reports = Vec::with_capacity(records.len());
    for record in records {
        let pr = PullRequest::try_from(record)?;
        let report = prune_stale_runs(
            host,
            pr.repo_owner(),
            pr.repo_name(),
            pr.branch_name(),
            workflow,
        )
        .await
        .map_err(|e| in_pull_request(&pr, e))?;
        reports.push((pr.number(), report));
    }
    Ok(reports)
}

/// Attach the pull request to an error raised while sweeping it.
fn in_pull_request(pr: &PullRequest, err: BotError) -> BotError {
    match err {
        BotError::NotFound { resource } => BotError::NotFound {
            resource: format!("{resource} (while pruning {pr})"),
        },
        BotError::Timeout { operation, after } => BotError::Timeout {
            operation: format!("{operation} for {pr}"),
            after,
        },
        BotError::Configuration(msg) => BotError::Configuration(format!("{pr}: {msg}")),
        other => {
            tracing::warn!(pr = %pr, error = %other, "sweep aborted");
            other
        }
    }
}
