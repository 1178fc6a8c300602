//! CI event payload parsing.
//!
//! The CI runner writes the webhook payload that triggered the workflow to
//! a file. Pull request and review payloads carry the whole pull request;
//! comment payloads (`action: "created"`) only identify it, so the pull
//! request is fetched from the host afterwards.

use std::path::Path;

use prbot_host::RepositoryHost;
use serde::Deserialize;

use crate::domain::{BotError, PullRequest, PullRequestFields, Result, ValidationError};

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    action: Option<String>,
    number: Option<u64>,
    pull_request: Option<RawPullRequest>,
    issue: Option<RawIssue>,
    review: Option<RawReview>,
    repository: Option<RawRepository>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPullRequest {
    number: Option<u64>,
    user: Option<RawUser>,
    head: Option<RawRef>,
    base: Option<RawRef>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIssue {
    number: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawReview {
    user: Option<RawUser>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    login: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRef {
    sha: Option<String>,
    #[serde(rename = "ref")]
    branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRepository {
    name: Option<String>,
    owner: Option<RawUser>,
}

/// The event that started this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Pull request, review, or pull_request_target event.
    PullRequest(PullRequest),
    /// A comment was created on a pull request.
    Comment {
        owner: String,
        repo: String,
        number: u64,
    },
}

const COMMENT_CREATED: &str = "created";

fn invalid(msg: &str) -> BotError {
    ValidationError::InvalidEventPayload(msg.to_string()).into()
}

impl TriggerEvent {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| {
            BotError::Configuration(format!("cannot read event file {}: {e}", path.display()))
        })?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(body)
            .map_err(|e| ValidationError::InvalidEventPayload(e.to_string()))?;

        let repository = raw.repository.unwrap_or_default();
        let owner = repository
            .owner
            .and_then(|o| o.login.or(o.name))
            .unwrap_or_default();
        let repo = repository.name.unwrap_or_default();

        if raw.action.as_deref() == Some(COMMENT_CREATED) {
            let number = raw
                .issue
                .and_then(|i| i.number)
                .or_else(|| raw.pull_request.as_ref().and_then(|p| p.number))
                .or(raw.number)
                .ok_or_else(|| invalid("comment event without a pull request number"))?;
            if owner.is_empty() || repo.is_empty() {
                return Err(invalid("comment event without repository coordinates"));
            }
            return Ok(TriggerEvent::Comment {
                owner,
                repo,
                number,
            });
        }

        let pr = raw
            .pull_request
            .ok_or_else(|| invalid("event has no pull_request"))?;
        let head = pr.head.unwrap_or_default();
        let base = pr.base.unwrap_or_default();
        let pull_request = PullRequest::new(PullRequestFields {
            number: raw.number.or(pr.number).unwrap_or_default(),
            author: pr.user.and_then(|u| u.login).unwrap_or_default(),
            repo_owner: owner,
            repo_name: repo,
            head_sha: head.sha.unwrap_or_default(),
            base_sha: base.sha.unwrap_or_default(),
            branch_name: head.branch.unwrap_or_default(),
        })?;

        if let Some(review) = raw.review {
            let reviewer = review.user.and_then(|u| u.login).unwrap_or_default();
            if reviewer.is_empty() {
                return Err(ValidationError::MissingPullRequestField {
                    field: "reviewer username",
                }
                .into());
            }
        }

        Ok(TriggerEvent::PullRequest(pull_request))
    }

    /// The pull request this event concerns, fetching it when the payload
    /// only carried its number.
    pub async fn resolve(self, host: &dyn RepositoryHost) -> Result<PullRequest> {
        match self {
            TriggerEvent::PullRequest(pr) => Ok(pr),
            TriggerEvent::Comment {
                owner,
                repo,
                number,
            } => {
                let record = host
                    .get_pull_request(&owner, &repo, number)
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            BotError::NotFound {
                                resource: format!("pull request {owner}/{repo}#{number}"),
                            }
                        } else {
                            BotError::host("get_pull_request")(e)
                        }
                    })?;
                Ok(PullRequest::try_from(record)?)
            }
        }
    }
}
