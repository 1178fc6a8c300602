//! Dismiss approvals that no longer cover the head commit.

use prbot_host::RepositoryHost;
use tracing::debug;

use crate::domain::{BotError, PullRequest, Result};
use crate::reviews::AggregatedReviews;

/// Dismissal text asking the required reviewers to look again.
pub fn dismiss_message(required: &[String]) -> String {
    let mentions: Vec<String> = required.iter().map(|r| format!("@{r}")).collect();
    format!("new commit pushed, please re-review {}", mentions.join(" "))
}

/// Dismiss every current approval on the pull request.
///
/// Stops at the first failed dismissal; approvals dismissed before it stay
/// dismissed. Returns how many were dismissed.
pub async fn invalidate_approvals(
    host: &dyn RepositoryHost,
    pr: &PullRequest,
    reviews: &AggregatedReviews,
    required: &[String],
) -> Result<usize> {
    let message = dismiss_message(required);
    let mut dismissed = 0;
    for review in reviews.approved() {
        host.dismiss_review(
            pr.repo_owner(),
            pr.repo_name(),
            pr.number(),
            review.id,
            &message,
        )
        .await
        .map_err(BotError::host("dismiss_review"))?;
        debug!(review_id = review.id, reviewer = %review.reviewer, "approval dismissed");
        dismissed += 1;
    }
    Ok(dismissed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PullRequestFields;
    use crate::reviews::aggregate;
    use chrono::Utc;
    use prbot_host::fakes::MemoryHost;
    use prbot_host::ReviewRecord;

    fn pr() -> PullRequest {
        PullRequest::new(PullRequestFields {
            number: 7,
            author: "external".into(),
            repo_owner: "o".into(),
            repo_name: "r".into(),
            head_sha: "new".into(),
            base_sha: "base".into(),
            branch_name: "feature".into(),
        })
        .unwrap()
    }

    fn seed(host: &MemoryHost, id: u64, login: &str, state: &str) -> ReviewRecord {
        let record = ReviewRecord {
            id: Some(id),
            reviewer: Some(login.into()),
            state: Some(state.into()),
            commit_id: Some("old".into()),
            submitted_at: Some(Utc::now()),
        };
        host.add_review("o", "r", 7, record.clone());
        record
    }

    #[test]
    fn message_mentions_every_required_reviewer() {
        assert_eq!(
            dismiss_message(&["foo".to_string(), "bar".to_string()]),
            "new commit pushed, please re-review @foo @bar"
        );
    }

    #[tokio::test]
    async fn dismisses_only_approvals() {
        let host = MemoryHost::new();
        let records = vec![
            seed(&host, 1, "foo", "APPROVED"),
            seed(&host, 2, "bar", "COMMENTED"),
            seed(&host, 3, "baz", "APPROVED"),
        ];
        let reviews = aggregate(records).unwrap();
        let required = vec!["foo".to_string(), "baz".to_string()];

        let n = invalidate_approvals(&host, &pr(), &reviews, &required)
            .await
            .unwrap();
        assert_eq!(n, 2);

        let dismissals = host.dismissals();
        let ids: Vec<u64> = dismissals.iter().map(|d| d.review_id).collect();
        assert_eq!(ids, [3, 1]);
        assert!(dismissals
            .iter()
            .all(|d| d.message == "new commit pushed, please re-review @foo @baz"));
    }

    #[tokio::test]
    async fn first_failure_aborts() {
        let host = MemoryHost::new();
        let records = vec![
            seed(&host, 1, "amy", "APPROVED"),
            seed(&host, 2, "bob", "APPROVED"),
            seed(&host, 3, "cat", "APPROVED"),
        ];
        host.fail_dismissal_of(2);
        let reviews = aggregate(records).unwrap();

        let err = invalidate_approvals(&host, &pr(), &reviews, &["amy".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::Host {
                operation: "dismiss_review",
                ..
            }
        ));
        let ids: Vec<u64> = host.dismissals().iter().map(|d| d.review_id).collect();
        assert_eq!(ids, [1]);
    }
}
