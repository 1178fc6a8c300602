//! Repository-wide stale run sweeps and workflow re-runs.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use prbot_core::{
    Bot, BotError, BotSettings, PullRequest, PullRequestFields, ReviewerPolicy,
    ReviewerPolicyConfig,
};
use prbot_host::fakes::MemoryHost;
use prbot_host::{PullRequestRecord, Workflow, WorkflowRun};

const OWNER: &str = "gravitational";
const REPO: &str = "teleport";
const CHECK: u64 = 11;
const ASSIGN: u64 = 12;

fn bot(host: &Arc<MemoryHost>) -> Bot {
    let policy =
        ReviewerPolicy::new(ReviewerPolicyConfig::from_json(r#"{"": ["admin"]}"#).unwrap())
            .unwrap();
    Bot::new(host.clone(), policy, BotSettings::default())
}

fn seeded_host() -> MemoryHost {
    let host = MemoryHost::new();
    host.add_workflow(
        OWNER,
        REPO,
        Workflow {
            id: CHECK,
            name: "Check".into(),
        },
    );
    host.add_workflow(
        OWNER,
        REPO,
        Workflow {
            id: ASSIGN,
            name: "Assign".into(),
        },
    );
    host
}

fn open_pr(host: &MemoryHost, number: u64, branch: &str, open: bool) {
    host.add_pull_request(
        PullRequestRecord {
            number: Some(number),
            author: Some(format!("author{number}")),
            repo_owner: Some(OWNER.into()),
            repo_name: Some(REPO.into()),
            head_sha: Some(format!("head{number}")),
            base_sha: Some("base".into()),
            head_ref: Some(branch.into()),
        },
        open,
    );
}

fn run(host: &MemoryHost, id: u64, workflow_id: u64, branch: &str, minute: i64) {
    host.add_run(
        OWNER,
        REPO,
        WorkflowRun {
            id,
            workflow_id,
            head_branch: Some(branch.into()),
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        },
    );
}

#[tokio::test]
async fn sweep_prunes_each_open_pull_request_branch() {
    let host = Arc::new(seeded_host());
    open_pr(&host, 1, "fix-a", true);
    open_pr(&host, 2, "fix-b", true);
    open_pr(&host, 3, "fix-c", false);

    run(&host, 10, CHECK, "fix-a", 1);
    run(&host, 11, CHECK, "fix-a", 2);
    run(&host, 20, CHECK, "fix-b", 1);
    run(&host, 30, CHECK, "fix-c", 1);
    run(&host, 31, CHECK, "fix-c", 2);
    run(&host, 12, ASSIGN, "fix-a", 0);

    let reports = bot(&host)
        .prune_stale_runs_for_repository(OWNER, REPO)
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0, 1);
    assert_eq!(reports[0].1.deleted, [10]);
    assert_eq!(reports[1].1.kept, Some(20));
    assert!(reports[1].1.deleted.is_empty());
    // closed pull requests and other workflows are left alone
    assert_eq!(host.remaining_runs(OWNER, REPO), [11, 20, 30, 31, 12]);
}

#[tokio::test]
async fn pull_requests_sharing_a_branch_name_share_runs() {
    let host = Arc::new(seeded_host());
    open_pr(&host, 1, "patch-1", true);
    open_pr(&host, 2, "patch-1", true);
    run(&host, 10, CHECK, "patch-1", 1);
    run(&host, 20, CHECK, "patch-1", 2);

    let reports = bot(&host)
        .prune_stale_runs_for_repository(OWNER, REPO)
        .await
        .unwrap();

    assert_eq!(reports[0].1.deleted, [10]);
    assert_eq!(reports[1].1.kept, Some(20));
    assert_eq!(host.remaining_runs(OWNER, REPO), [20]);
}

#[tokio::test]
async fn sweep_failure_names_pull_request() {
    let host = Arc::new(MemoryHost::new());
    open_pr(&host, 7, "fix-a", true);

    let err = bot(&host)
        .prune_stale_runs_for_repository(OWNER, REPO)
        .await
        .unwrap_err();
    match err {
        BotError::NotFound { resource } => assert!(resource.contains("#7"), "{resource}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn sweep_stops_at_first_failure() {
    let host = Arc::new(seeded_host());
    open_pr(&host, 1, "fix-a", true);
    open_pr(&host, 2, "fix-b", true);
    run(&host, 10, CHECK, "fix-a", 1);
    run(&host, 11, CHECK, "fix-a", 2);
    run(&host, 20, CHECK, "fix-b", 1);
    run(&host, 21, CHECK, "fix-b", 2);
    host.fail_delete_of(10);

    let err = bot(&host)
        .prune_stale_runs_for_repository(OWNER, REPO)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Host { .. }));
    assert!(host.deleted_runs().is_empty());
    assert_eq!(host.remaining_runs(OWNER, REPO), [10, 11, 20, 21]);
}

#[tokio::test]
async fn rerun_workflows_reruns_check_then_assign() {
    let host = Arc::new(seeded_host());
    run(&host, 10, CHECK, "fix-a", 1);
    run(&host, 11, CHECK, "fix-a", 5);
    run(&host, 12, ASSIGN, "fix-a", 2);
    run(&host, 13, ASSIGN, "fix-a", 3);

    let pr = PullRequest::new(PullRequestFields {
        number: 1,
        author: "author1".into(),
        repo_owner: OWNER.into(),
        repo_name: REPO.into(),
        head_sha: "head1".into(),
        base_sha: "base".into(),
        branch_name: "fix-a".into(),
    })
    .unwrap();
    let rerun = bot(&host).rerun_workflows(&pr).await.unwrap();
    assert_eq!(rerun, [11, 13]);
    assert_eq!(host.reruns(), [11, 13]);
}
