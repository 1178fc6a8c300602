//! In-memory fake of `RepositoryHost` (testing only)
//!
//! `MemoryHost` is seeded with pull requests, reviews, comments, commits,
//! workflows and runs, records every mutation it receives, and can be told
//! to fail specific operations so callers can exercise their error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::HostError;
use crate::host_traits::*;

type RepoKey = (String, String);
type PullKey = (String, String, u64);

fn repo_key(owner: &str, repo: &str) -> RepoKey {
    (owner.to_string(), repo.to_string())
}

fn pull_key(owner: &str, repo: &str, number: u64) -> PullKey {
    (owner.to_string(), repo.to_string(), number)
}

/// A review dismissal received by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dismissal {
    pub number: u64,
    pub review_id: u64,
    pub message: String,
}

#[derive(Debug, Default)]
struct HostState {
    users: HashSet<String>,
    pulls: BTreeMap<PullKey, (PullRequestRecord, bool)>,
    reviews: HashMap<PullKey, Vec<ReviewRecord>>,
    comments: HashMap<PullKey, Vec<CommentRecord>>,
    comparisons: HashMap<(String, String), CommitComparison>,
    commits: HashMap<String, CommitRecord>,
    workflows: HashMap<RepoKey, Vec<Workflow>>,
    runs: HashMap<RepoKey, Vec<WorkflowRun>>,

    dismissals: Vec<Dismissal>,
    deleted_runs: Vec<u64>,
    reruns: Vec<u64>,
    review_requests: Vec<(u64, Vec<String>)>,
    operations: Vec<String>,

    failing_operations: HashSet<String>,
    failing_deletes: HashSet<u64>,
    failing_dismissals: HashSet<u64>,
}

/// In-memory repository host.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
    latency: Option<Duration>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_user(&self, login: &str) {
        self.state.lock().unwrap().users.insert(login.to_string());
    }

    /// Register a pull request; `open` controls whether the sweep sees it.
    pub fn add_pull_request(&self, record: PullRequestRecord, open: bool) {
        let key = pull_key(
            record.repo_owner.as_deref().unwrap_or_default(),
            record.repo_name.as_deref().unwrap_or_default(),
            record.number.unwrap_or_default(),
        );
        self.state.lock().unwrap().pulls.insert(key, (record, open));
    }

    pub fn add_review(&self, owner: &str, repo: &str, number: u64, review: ReviewRecord) {
        self.state
            .lock()
            .unwrap()
            .reviews
            .entry(pull_key(owner, repo, number))
            .or_default()
            .push(review);
    }

    pub fn add_comment(&self, owner: &str, repo: &str, number: u64, comment: CommentRecord) {
        self.state
            .lock()
            .unwrap()
            .comments
            .entry(pull_key(owner, repo, number))
            .or_default()
            .push(comment);
    }

    pub fn set_comparison(&self, base: &str, head: &str, changed_files: usize) {
        self.state.lock().unwrap().comparisons.insert(
            (base.to_string(), head.to_string()),
            CommitComparison { changed_files },
        );
    }

    pub fn add_commit(&self, commit: CommitRecord) {
        self.state
            .lock()
            .unwrap()
            .commits
            .insert(commit.sha.clone(), commit);
    }

    pub fn add_workflow(&self, owner: &str, repo: &str, workflow: Workflow) {
        self.state
            .lock()
            .unwrap()
            .workflows
            .entry(repo_key(owner, repo))
            .or_default()
            .push(workflow);
    }

    pub fn add_run(&self, owner: &str, repo: &str, run: WorkflowRun) {
        self.state
            .lock()
            .unwrap()
            .runs
            .entry(repo_key(owner, repo))
            .or_default()
            .push(run);
    }

    // -- fault injection ----------------------------------------------------

    /// Make every call of the named trait method fail with a 500.
    pub fn fail_operation(&self, operation: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_operations
            .insert(operation.to_string());
    }

    /// Make deletion of one specific run fail.
    pub fn fail_delete_of(&self, run_id: u64) {
        self.state.lock().unwrap().failing_deletes.insert(run_id);
    }

    /// Make dismissal of one specific review fail.
    pub fn fail_dismissal_of(&self, review_id: u64) {
        self.state
            .lock()
            .unwrap()
            .failing_dismissals
            .insert(review_id);
    }

    // -- inspection ---------------------------------------------------------

    pub fn dismissals(&self) -> Vec<Dismissal> {
        self.state.lock().unwrap().dismissals.clone()
    }

    pub fn deleted_runs(&self) -> Vec<u64> {
        self.state.lock().unwrap().deleted_runs.clone()
    }

    pub fn reruns(&self) -> Vec<u64> {
        self.state.lock().unwrap().reruns.clone()
    }

    pub fn review_requests(&self) -> Vec<(u64, Vec<String>)> {
        self.state.lock().unwrap().review_requests.clone()
    }

    /// Ids of the runs still present for a repository.
    pub fn remaining_runs(&self, owner: &str, repo: &str) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&repo_key(owner, repo))
            .map(|runs| runs.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    /// Names of the trait methods called so far, in call order.
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().unwrap().operations.clone()
    }

    async fn enter(&self, operation: &str) -> HostResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock().unwrap();
        state.operations.push(operation.to_string());
        if state.failing_operations.contains(operation) {
            return Err(HostError::Api {
                status: 500,
                endpoint: operation.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryHost for MemoryHost {
    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<ReviewRecord>> {
        self.enter("list_reviews").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .get(&pull_key(owner, repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<CommentRecord>> {
        self.enter("list_comments").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .get(&pull_key(owner, repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn compare_commits(
        &self,
        _owner: &str,
        _repo: &str,
        base: &str,
        head: &str,
    ) -> HostResult<CommitComparison> {
        self.enter("compare_commits").await?;
        let state = self.state.lock().unwrap();
        state
            .comparisons
            .get(&(base.to_string(), head.to_string()))
            .copied()
            .ok_or_else(|| HostError::NotFound {
                resource: format!("comparison {base}...{head}"),
            })
    }

    async fn get_commit(&self, _owner: &str, _repo: &str, sha: &str) -> HostResult<CommitRecord> {
        self.enter("get_commit").await?;
        let state = self.state.lock().unwrap();
        state
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound {
                resource: format!("commit {sha}"),
            })
    }

    async fn dismiss_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        review_id: u64,
        message: &str,
    ) -> HostResult<()> {
        self.enter("dismiss_review").await?;
        let mut state = self.state.lock().unwrap();
        if state.failing_dismissals.contains(&review_id) {
            return Err(HostError::Api {
                status: 422,
                endpoint: format!("dismiss_review/{review_id}"),
                message: "injected failure".to_string(),
            });
        }
        let review = state
            .reviews
            .get_mut(&pull_key(owner, repo, number))
            .and_then(|reviews| reviews.iter_mut().find(|r| r.id == Some(review_id)))
            .ok_or_else(|| HostError::NotFound {
                resource: format!("review {review_id}"),
            })?;
        review.state = Some("DISMISSED".to_string());
        state.dismissals.push(Dismissal {
            number,
            review_id,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn list_workflows(&self, owner: &str, repo: &str) -> HostResult<Vec<Workflow>> {
        self.enter("list_workflows").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .workflows
            .get(&repo_key(owner, repo))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: Option<&str>,
    ) -> HostResult<Vec<WorkflowRun>> {
        self.enter("list_workflow_runs").await?;
        let state = self.state.lock().unwrap();
        let runs = state
            .runs
            .get(&repo_key(owner, repo))
            .map(|runs| {
                runs.iter()
                    .filter(|r| r.workflow_id == workflow_id)
                    .filter(|r| branch.map(|b| r.head_branch.as_deref() == Some(b)).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(runs)
    }

    async fn delete_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()> {
        self.enter("delete_workflow_run").await?;
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(&run_id) {
            return Err(HostError::Api {
                status: 403,
                endpoint: format!("repos/{owner}/{repo}/actions/runs/{run_id}"),
                message: "injected failure".to_string(),
            });
        }
        let runs = state.runs.entry(repo_key(owner, repo)).or_default();
        let before = runs.len();
        runs.retain(|r| r.id != run_id);
        if runs.len() == before {
            return Err(HostError::NotFound {
                resource: format!("workflow run {run_id}"),
            });
        }
        state.deleted_runs.push(run_id);
        Ok(())
    }

    async fn rerun_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()> {
        self.enter("rerun_workflow_run").await?;
        let mut state = self.state.lock().unwrap();
        let exists = state
            .runs
            .get(&repo_key(owner, repo))
            .map(|runs| runs.iter().any(|r| r.id == run_id))
            .unwrap_or(false);
        if !exists {
            return Err(HostError::NotFound {
                resource: format!("workflow run {run_id}"),
            });
        }
        state.reruns.push(run_id);
        Ok(())
    }

    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> HostResult<Vec<PullRequestRecord>> {
        self.enter("list_open_pull_requests").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .pulls
            .iter()
            .filter(|((o, r, _), (_, open))| o == owner && r == repo && *open)
            .map(|(_, (record, _))| record.clone())
            .collect())
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<PullRequestRecord> {
        self.enter("get_pull_request").await?;
        let state = self.state.lock().unwrap();
        state
            .pulls
            .get(&pull_key(owner, repo, number))
            .map(|(record, _)| record.clone())
            .ok_or_else(|| HostError::NotFound {
                resource: format!("pull request {owner}/{repo}#{number}"),
            })
    }

    async fn user_exists(&self, login: &str) -> HostResult<bool> {
        self.enter("user_exists").await?;
        Ok(self.state.lock().unwrap().users.contains(login))
    }

    async fn request_reviewers(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> HostResult<()> {
        self.enter("request_reviewers").await?;
        self.state
            .lock()
            .unwrap()
            .review_requests
            .push((number, reviewers.to_vec()));
        Ok(())
    }
}
