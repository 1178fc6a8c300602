//! GitHub REST implementation of `RepositoryHost`.
//!
//! Talks to the v3 REST API with a bearer token. List endpoints are read
//! page by page (`per_page=100`) until a short page comes back.
//!
//! Deleting a workflow run has no typed client method in most GitHub SDKs;
//! here it is one more authenticated request, built from the fixed template
//! `repos/{owner}/{repo}/actions/runs/{run_id}` against the API base.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host_traits::*;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API base URL (no trailing slash needed)
    pub api_url: String,
    /// Token sent as `Authorization: Bearer`
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout_secs: 30,
            user_agent: format!("prbot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GithubConfig {
    /// Create a new config from `GITHUB_API_URL` and `GITHUB_TOKEN`
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific API endpoint
    pub fn new(api_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.to_string(),
            token: None,
            ..Self::default()
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// `RepositoryHost` backed by the GitHub REST API.
pub struct GithubHost {
    config: GithubConfig,
    client: Client,
}

impl GithubHost {
    /// Create a new GitHub host client.
    pub fn new(config: GithubConfig) -> Result<Self, HostError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = &config.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HostError::Authentication("invalid token format".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HostError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.api_url(path))
    }

    /// Map a response to an error unless it is a success.
    async fn check(response: Response, endpoint: &str) -> Result<Response, HostError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);

        Err(match status {
            StatusCode::UNAUTHORIZED => HostError::Authentication(message),
            StatusCode::NOT_FOUND => HostError::NotFound {
                resource: endpoint.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited {
                endpoint: endpoint.to_string(),
            },
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                HostError::RateLimited {
                    endpoint: endpoint.to_string(),
                }
            }
            _ => HostError::Api {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                message,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HostError> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::check(response, path).await?;
        response.json::<T>().await.map_err(|e| HostError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch every page of a list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, HostError> {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let response = Self::check(response, path).await?;
            let items: Vec<T> = response.json().await.map_err(|e| HostError::Decode {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
            let count = items.len();
            all.extend(items);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        debug!(endpoint = %path, items = all.len(), "fetched all pages");
        Ok(all)
    }

    /// Like `get_all_pages` for endpoints that wrap the list in an object.
    async fn get_all_wrapped_pages<W, T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        unwrap: impl Fn(W) -> Vec<T>,
    ) -> Result<Vec<T>, HostError>
    where
        W: DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let response = Self::check(response, path).await?;
            let wrapper: W = response.json().await.map_err(|e| HostError::Decode {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
            let items = unwrap(wrapper);
            let count = items.len();
            all.extend(items);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), HostError> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::check(response, path).await?;
        Ok(())
    }
}

/// Path of a single workflow run.
pub fn workflow_run_path(owner: &str, repo: &str, run_id: u64) -> String {
    format!("repos/{owner}/{repo}/actions/runs/{run_id}")
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserDto {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewDto {
    id: Option<u64>,
    user: Option<UserDto>,
    state: Option<String>,
    commit_id: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

impl From<ReviewDto> for ReviewRecord {
    fn from(dto: ReviewDto) -> Self {
        ReviewRecord {
            id: dto.id,
            reviewer: dto.user.and_then(|u| u.login),
            state: dto.state,
            commit_id: dto.commit_id,
            submitted_at: dto.submitted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentDto {
    id: Option<u64>,
    user: Option<UserDto>,
    author_association: Option<String>,
    commit_id: Option<String>,
    body: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<CommentDto> for CommentRecord {
    fn from(dto: CommentDto) -> Self {
        CommentRecord {
            id: dto.id,
            commenter: dto.user.and_then(|u| u.login),
            author_association: dto.author_association,
            commit_id: dto.commit_id,
            body: dto.body,
            created_at: dto.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonDto {
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VerificationDto {
    verified: Option<bool>,
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitCommitDto {
    verification: Option<VerificationDto>,
}

#[derive(Debug, Deserialize)]
struct CommitDto {
    sha: String,
    commit: GitCommitDto,
}

impl From<CommitDto> for CommitRecord {
    fn from(dto: CommitDto) -> Self {
        CommitRecord {
            sha: dto.sha,
            verification: dto.commit.verification.map(|v| CommitVerification {
                payload: v.payload,
                verified: v.verified,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowsDto {
    workflows: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsDto {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct RepoOwnerDto {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoDto {
    name: Option<String>,
    owner: Option<RepoOwnerDto>,
}

#[derive(Debug, Deserialize)]
struct BranchDto {
    sha: Option<String>,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    repo: Option<RepoDto>,
}

#[derive(Debug, Deserialize)]
struct PullRequestDto {
    number: Option<u64>,
    user: Option<UserDto>,
    head: Option<BranchDto>,
    base: Option<BranchDto>,
}

impl From<PullRequestDto> for PullRequestRecord {
    fn from(dto: PullRequestDto) -> Self {
        let (head_sha, head_ref) = dto
            .head
            .map(|h| (h.sha, h.git_ref))
            .unwrap_or((None, None));
        let (base_sha, base_repo) = dto.base.map(|b| (b.sha, b.repo)).unwrap_or((None, None));
        let (repo_name, repo_owner) = base_repo
            .map(|r| (r.name, r.owner.and_then(|o| o.login)))
            .unwrap_or((None, None));
        PullRequestRecord {
            number: dto.number,
            author: dto.user.and_then(|u| u.login),
            repo_owner,
            repo_name,
            head_sha,
            base_sha,
            head_ref,
        }
    }
}

// ---------------------------------------------------------------------------
// RepositoryHost
// ---------------------------------------------------------------------------

#[async_trait]
impl RepositoryHost for GithubHost {
    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<ReviewRecord>> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}/reviews");
        let reviews: Vec<ReviewDto> = self.get_all_pages(&path, &[]).await?;
        Ok(reviews.into_iter().map(ReviewRecord::from).collect())
    }

    async fn list_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<Vec<CommentRecord>> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}/comments");
        let comments: Vec<CommentDto> = self.get_all_pages(&path, &[]).await?;
        Ok(comments.into_iter().map(CommentRecord::from).collect())
    }

    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> HostResult<CommitComparison> {
        let path = format!("repos/{owner}/{repo}/compare/{base}...{head}");
        let comparison: ComparisonDto = self.get_json(&path).await?;
        Ok(CommitComparison {
            changed_files: comparison.files.len(),
        })
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> HostResult<CommitRecord> {
        let path = format!("repos/{owner}/{repo}/commits/{sha}");
        let commit: CommitDto = self.get_json(&path).await?;
        Ok(commit.into())
    }

    async fn dismiss_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        review_id: u64,
        message: &str,
    ) -> HostResult<()> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}/reviews/{review_id}/dismissals");
        self.send_empty(
            Method::PUT,
            &path,
            Some(serde_json::json!({ "message": message })),
        )
        .await
    }

    async fn list_workflows(&self, owner: &str, repo: &str) -> HostResult<Vec<Workflow>> {
        let path = format!("repos/{owner}/{repo}/actions/workflows");
        self.get_all_wrapped_pages(&path, &[], |w: WorkflowsDto| w.workflows)
            .await
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: Option<&str>,
    ) -> HostResult<Vec<WorkflowRun>> {
        let path = format!("repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs");
        let query: Vec<(&str, String)> = branch
            .map(|b| vec![("branch", b.to_string())])
            .unwrap_or_default();
        self.get_all_wrapped_pages(&path, &query, |r: WorkflowRunsDto| r.workflow_runs)
            .await
    }

    async fn delete_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()> {
        let path = workflow_run_path(owner, repo, run_id);
        self.send_empty(Method::DELETE, &path, None).await
    }

    async fn rerun_workflow_run(&self, owner: &str, repo: &str, run_id: u64) -> HostResult<()> {
        let path = format!("{}/rerun", workflow_run_path(owner, repo, run_id));
        self.send_empty(Method::POST, &path, None).await
    }

    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> HostResult<Vec<PullRequestRecord>> {
        let path = format!("repos/{owner}/{repo}/pulls");
        let pulls: Vec<PullRequestDto> = self
            .get_all_pages(&path, &[("state", "open".to_string())])
            .await?;
        Ok(pulls.into_iter().map(PullRequestRecord::from).collect())
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> HostResult<PullRequestRecord> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}");
        let pull: PullRequestDto = self.get_json(&path).await?;
        Ok(pull.into())
    }

    async fn user_exists(&self, login: &str) -> HostResult<bool> {
        let path = format!("users/{login}");
        match self.get_json::<UserDto>(&path).await {
            Ok(_) => Ok(true),
            Err(HostError::NotFound { .. }) => {
                warn!(login = %login, "user not found on host");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> HostResult<()> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}/requested_reviewers");
        self.send_empty(
            Method::POST,
            &path,
            Some(serde_json::json!({ "reviewers": reviewers })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(api_url: &str) -> GithubHost {
        GithubHost::new(GithubConfig::new(api_url).with_token("t0ken")).unwrap()
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let h = host("https://ghe.example.com/api/v3/");
        assert_eq!(
            h.api_url("/repos/o/r/pulls"),
            "https://ghe.example.com/api/v3/repos/o/r/pulls"
        );
    }

    #[test]
    fn delete_path_follows_fixed_template() {
        let h = host(DEFAULT_API_URL);
        assert_eq!(
            h.api_url(&workflow_run_path("gravitational", "teleport", 42)),
            "https://api.github.com/repos/gravitational/teleport/actions/runs/42"
        );
    }

    #[test]
    fn invalid_token_is_rejected() {
        let config = GithubConfig::new(DEFAULT_API_URL).with_token("bad\ntoken");
        assert!(matches!(
            GithubHost::new(config),
            Err(HostError::Authentication(_))
        ));
    }

    #[test]
    fn review_dto_maps_missing_user_to_none() {
        let dto: ReviewDto = serde_json::from_value(serde_json::json!({
            "id": 7,
            "user": null,
            "state": "APPROVED",
            "commit_id": "abc",
            "submitted_at": "2021-09-27T09:57:24Z"
        }))
        .unwrap();
        let record = ReviewRecord::from(dto);
        assert_eq!(record.id, Some(7));
        assert_eq!(record.reviewer, None);
        assert_eq!(record.state.as_deref(), Some("APPROVED"));
        assert!(record.submitted_at.is_some());
    }

    #[test]
    fn pull_request_dto_uses_base_repository_coordinates() {
        let dto: PullRequestDto = serde_json::from_value(serde_json::json!({
            "number": 2,
            "user": { "login": "Codertocat" },
            "head": { "sha": "ec26c3e", "ref": "changes", "repo": { "name": "fork", "owner": { "login": "Codertocat" } } },
            "base": { "sha": "f95f852", "ref": "master", "repo": { "name": "Hello-World", "owner": { "login": "octo-org" } } }
        }))
        .unwrap();
        let record = PullRequestRecord::from(dto);
        assert_eq!(record.repo_owner.as_deref(), Some("octo-org"));
        assert_eq!(record.repo_name.as_deref(), Some("Hello-World"));
        assert_eq!(record.head_ref.as_deref(), Some("changes"));
        assert_eq!(record.base_sha.as_deref(), Some("f95f852"));
    }

    #[test]
    fn commit_dto_keeps_verification() {
        let dto: CommitDto = serde_json::from_value(serde_json::json!({
            "sha": "abc",
            "commit": { "verification": { "verified": true, "payload": "tree 1\ncommitter GitHub <noreply@github.com> 1 +0000" } }
        }))
        .unwrap();
        let record = CommitRecord::from(dto);
        let v = record.verification.unwrap();
        assert_eq!(v.verified, Some(true));
        assert!(v.payload.unwrap().contains("noreply@github.com"));
    }

    #[test]
    fn workflow_runs_dto_parses_created_at() {
        let dto: WorkflowRunsDto = serde_json::from_value(serde_json::json!({
            "total_count": 1,
            "workflow_runs": [
                { "id": 30433642, "workflow_id": 159038, "head_branch": "changes", "created_at": "2020-01-22T19:33:08Z", "status": "queued" }
            ]
        }))
        .unwrap();
        assert_eq!(dto.workflow_runs.len(), 1);
        assert_eq!(dto.workflow_runs[0].workflow_id, 159038);
    }

    #[test]
    fn env_config_builds_a_client() {
        let config = GithubConfig::from_env();
        assert!(config.user_agent.starts_with("prbot/"));
        assert!(!config.api_url.is_empty());
        GithubHost::new(config).unwrap();
    }

    #[test]
    fn workflow_runs_dto_accepts_null_branch() {
        let dto: WorkflowRunsDto = serde_json::from_value(serde_json::json!({
            "total_count": 2,
            "workflow_runs": [
                { "id": 1, "workflow_id": 7, "head_branch": "changes", "created_at": "2020-01-22T19:33:08Z" },
                { "id": 2, "workflow_id": 7, "head_branch": null, "created_at": "2020-01-22T19:40:00Z" }
            ]
        }))
        .unwrap();
        assert_eq!(dto.workflow_runs.len(), 2);
        assert_eq!(dto.workflow_runs[0].head_branch.as_deref(), Some("changes"));
        assert_eq!(dto.workflow_runs[1].head_branch, None);
    }
}
