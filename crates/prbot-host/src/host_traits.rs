//! Repository host capability definitions for prbot
//!
//! `RepositoryHost` is the narrow surface the decision engine needs from a
//! code host: reading reviews, comments, commits and workflow runs, and the
//! handful of mutations it performs (dismissing reviews, deleting and
//! re-running workflow runs, requesting reviewers).
//!
//! Records returned here are snapshots exactly as the host reported them.
//! Fields the host may omit are `Option`s; validating them is the caller's
//! job. An in-memory fake lives in the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Result type for host operations
pub type HostResult<T> = std::result::Result<T, HostError>;

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// Pull request metadata as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: Option<u64>,
    /// Login of the pull request author
    pub author: Option<String>,
    /// Owner of the repository the pull request targets
    pub repo_owner: Option<String>,
    /// Name of the repository the pull request targets
    pub repo_name: Option<String>,
    pub head_sha: Option<String>,
    pub base_sha: Option<String>,
    /// Name of the branch being merged in
    pub head_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Reviews and comments
// ---------------------------------------------------------------------------

/// A single review event on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Option<u64>,
    pub reviewer: Option<String>,
    /// Raw state string, e.g. `APPROVED` or `CHANGES_REQUESTED`
    pub state: Option<String>,
    /// Commit the review was submitted against
    pub commit_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// A review comment on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Option<u64>,
    pub commenter: Option<String>,
    /// Raw association string, e.g. `OWNER` or `COLLABORATOR`
    pub author_association: Option<String>,
    /// Commit the comment was attached to
    pub commit_id: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// Result of comparing two commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitComparison {
    /// Number of files that differ between base and head
    pub changed_files: usize,
}

/// Signature verification metadata attached to a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitVerification {
    /// Signed payload (the raw commit object text)
    pub payload: Option<String>,
    pub verified: Option<bool>,
}

/// A single commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub verification: Option<CommitVerification>,
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// A workflow definition in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
}

/// One invocation of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub workflow_id: u64,
    /// Branch the run was triggered for. GitHub reports `null` for runs
    /// not tied to a branch.
    #[serde(default)]
    pub head_branch: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RepositoryHost
// ---------------------------------------------------------------------------

/// Capabilities of a repository host.
///
/// Implementations must not retry internally beyond what their transport
/// does on its own, and must report every failure as a `HostError`.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// All reviews on a pull request, in host order.
    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<ReviewRecord>>;

    /// All review comments on a pull request, in host order.
    async fn list_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<CommentRecord>>;

    /// Compare `base...head`.
    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> HostResult<CommitComparison>;

    /// Fetch a single commit with its verification metadata.
    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> HostResult<CommitRecord>;

    /// Dismiss a review, leaving `message` as the dismissal reason.
    async fn dismiss_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        review_id: u64,
        message: &str,
    ) -> HostResult<()>;

    /// All workflows defined in a repository.
    async fn list_workflows(&self, owner: &str, repo: &str) -> HostResult<Vec<Workflow>>;

    /// Runs of one workflow, optionally restricted to a branch.
    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: Option<&str>,
    ) -> HostResult<Vec<WorkflowRun>>;

    /// Permanently remove a workflow run.
    async fn delete_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()>;

    /// Trigger a re-run of a workflow run.
    async fn rerun_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()>;

    /// All open pull requests of a repository.
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> HostResult<Vec<PullRequestRecord>>;

    /// A single pull request by number.
    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<PullRequestRecord>;

    /// Whether a login resolves against the host's user directory.
    async fn user_exists(&self, login: &str) -> HostResult<bool>;

    /// Request reviews from `reviewers` on a pull request.
    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> HostResult<()>;
}
