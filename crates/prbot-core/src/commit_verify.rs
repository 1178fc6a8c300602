//! Decide whether a commit pushed after approval is safe to keep approvals for.
//!
//! A head commit is safe only when it changes nothing relative to the base
//! (a branch update) and the host itself signed it.

use prbot_host::RepositoryHost;
use tracing::debug;

use crate::domain::{BotError, CommitRejection, PolicyViolation, PullRequest, Result};

/// Signature payload fragment identifying commits made by the host's web flow.
pub const TRUSTED_COMMIT_MARKER: &str = "committer GitHub <noreply@github.com>";

/// Verify the pull request's head commit.
///
/// Rejections surface as [`PolicyViolation::UnsafeCommit`]; host failures
/// surface as [`BotError::Host`].
pub async fn verify_safe_commit(
    host: &dyn RepositoryHost,
    pr: &PullRequest,
    trusted_marker: &str,
) -> Result<()> {
    let comparison = host
        .compare_commits(pr.repo_owner(), pr.repo_name(), pr.base_sha(), pr.head_sha())
        .await
        .map_err(BotError::host("compare_commits"))?;
    if comparison.changed_files != 0 {
        return Err(reject(CommitRejection::FilesChanged {
            changed_files: comparison.changed_files,
        }));
    }

    let commit = host
        .get_commit(pr.repo_owner(), pr.repo_name(), pr.head_sha())
        .await
        .map_err(BotError::host("get_commit"))?;
    let verification = commit.verification.ok_or_else(|| {
        reject(CommitRejection::MissingVerification {
            sha: pr.head_sha().to_string(),
        })
    })?;

    let verified = verification.verified.unwrap_or(false);
    let signed_by_host = verification
        .payload
        .as_deref()
        .map(|p| p.contains(trusted_marker))
        .unwrap_or(false);
    if !verified || !signed_by_host {
        return Err(reject(CommitRejection::UntrustedSignature {
            sha: pr.head_sha().to_string(),
        }));
    }

    debug!(sha = %pr.head_sha(), "head commit verified as host-signed branch update");
    Ok(())
}

fn reject(rejection: CommitRejection) -> BotError {
    PolicyViolation::UnsafeCommit(rejection).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PullRequestFields;
    use prbot_host::fakes::MemoryHost;
    use prbot_host::{CommitRecord, CommitVerification};

    fn pr() -> PullRequest {
        PullRequest::new(PullRequestFields {
            number: 1,
            author: "external".into(),
            repo_owner: "o".into(),
            repo_name: "r".into(),
            head_sha: "head".into(),
            base_sha: "base".into(),
            branch_name: "feature".into(),
        })
        .unwrap()
    }

    fn signed(verified: bool, payload: &str) -> CommitRecord {
        CommitRecord {
            sha: "head".into(),
            verification: Some(CommitVerification {
                payload: Some(payload.into()),
                verified: Some(verified),
            }),
        }
    }

    fn rejection(err: BotError) -> CommitRejection {
        match err {
            BotError::Policy(PolicyViolation::UnsafeCommit(r)) => r,
            other => panic!("expected unsafe commit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn host_signed_empty_diff_is_safe() {
        let host = MemoryHost::new();
        host.set_comparison("base", "head", 0);
        host.add_commit(signed(
            true,
            "tree abc\nparent def\ncommitter GitHub <noreply@github.com> 1600000000 +0000",
        ));
        verify_safe_commit(&host, &pr(), TRUSTED_COMMIT_MARKER)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn changed_files_are_rejected_before_signature_lookup() {
        let host = MemoryHost::new();
        host.set_comparison("base", "head", 2);
        let err = verify_safe_commit(&host, &pr(), TRUSTED_COMMIT_MARKER)
            .await
            .unwrap_err();
        assert_eq!(
            rejection(err),
            CommitRejection::FilesChanged { changed_files: 2 }
        );
        assert!(!host.operations().contains(&"get_commit".to_string()));
    }

    #[tokio::test]
    async fn unverified_or_foreign_signature_is_rejected() {
        for commit in [
            signed(false, "committer GitHub <noreply@github.com>"),
            signed(true, "committer Mallory <m@example.com>"),
        ] {
            let host = MemoryHost::new();
            host.set_comparison("base", "head", 0);
            host.add_commit(commit);
            let err = verify_safe_commit(&host, &pr(), TRUSTED_COMMIT_MARKER)
                .await
                .unwrap_err();
            assert!(matches!(
                rejection(err),
                CommitRejection::UntrustedSignature { .. }
            ));
        }
    }

    #[tokio::test]
    async fn missing_verification_is_rejected() {
        let host = MemoryHost::new();
        host.set_comparison("base", "head", 0);
        host.add_commit(CommitRecord {
            sha: "head".into(),
            verification: None,
        });
        let err = verify_safe_commit(&host, &pr(), TRUSTED_COMMIT_MARKER)
            .await
            .unwrap_err();
        assert!(matches!(
            rejection(err),
            CommitRejection::MissingVerification { .. }
        ));
    }

    #[tokio::test]
    async fn comparison_failure_is_a_host_error() {
        let host = MemoryHost::new();
        host.fail_operation("compare_commits");
        let err = verify_safe_commit(&host, &pr(), TRUSTED_COMMIT_MARKER)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::Host {
                operation: "compare_commits",
                ..
            }
        ));
    }
}
