/*!
 * Source Descriptor Integration Tests
 *
 * Every descriptor the DLP file service hands out is released exactly
 * once: on the failing path, on exact-URI reuse, or at teardown.
 */

use crate::fakes::{FileSpec, Harness, MockAssets, READER};
use dlp_sandbox_broker::permissions::GatheringPolicy;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;

const PLAN: &str = "file://docs/plan.xlsx.dlp";
const A: &str = "file://docs/a.docx.dlp";
const B: &str = "file://docs/b.docx.dlp";

#[tokio::test]
async fn test_parse_failure_releases_descriptor() {
    let h = Harness::new();
    h.files.set(
        PLAN,
        FileSpec {
            fail_open: true,
            ..FileSpec::default()
        },
    );

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert_eq!(h.files.released_fds(), vec![101]);
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_no_grant_releases_descriptor() {
    let h = Harness::new();
    h.identity.login("stranger@corp");

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_install_failure_releases_descriptor() {
    let h = Harness::new();
    h.sandboxes.fail_install.store(true, Ordering::SeqCst);

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_link_failure_releases_descriptor() {
    let h = Harness::new();
    h.files.set(
        PLAN,
        FileSpec {
            refuse_link: true,
            ..FileSpec::default()
        },
    );

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_asset_failure_releases_descriptor() {
    let mut assets = MockAssets::new();
    assets.expect_asset_for().returning(|_| None);
    let h = Harness::with_assets(assets);

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_launch_failure_releases_descriptor_after_file() {
    let h = Harness::new();
    h.sandboxes.fail_launch.store(true, Ordering::SeqCst);

    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert!(h.files.held_fds().is_empty());

    let journal = h.journal.entries();
    let closed_at = journal
        .iter()
        .position(|e| *e == format!("close_file:{}", PLAN))
        .unwrap();
    assert_eq!(journal[closed_at + 1], "release_fd:101");
}

#[tokio::test]
async fn test_repeated_opens_hold_one_descriptor() {
    let h = Harness::new();
    for _ in 0..3 {
        h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();
    }

    assert_eq!(h.files.held_fds(), vec![101]);
    assert_eq!(h.files.released_fds(), vec![102, 103]);
}

#[tokio::test]
async fn test_failed_relaunch_releases_only_its_own_descriptor() {
    let h = Harness::new();
    h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    h.sandboxes.fail_launch.store(true, Ordering::SeqCst);
    assert!(h.open(PLAN, "plan.xlsx.dlp").await.0.is_err());
    assert_eq!(h.files.held_fds(), vec![101]);
}

#[tokio::test]
async fn test_close_link_releases_session_descriptor() {
    let h = Harness::new();
    let outcome = h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();
    assert_eq!(h.files.held_fds(), vec![101]);

    h.broker
        .close_link(&outcome.key, &outcome.link_name)
        .await
        .unwrap();
    assert!(h.files.held_fds().is_empty());
}

#[tokio::test]
async fn test_sandbox_exit_releases_every_descriptor() {
    let h = Harness::new();
    h.identity.login(READER);
    for uri in [A, B] {
        h.files.set(
            uri,
            FileSpec {
                gathering: GatheringPolicy::Gathering,
                link_mode: 0o400,
                ..FileSpec::default()
            },
        );
    }
    let first = h.open(A, "a.docx.dlp").await.0.unwrap();
    h.open(B, "b.docx.dlp").await.0.unwrap();
    assert_eq!(h.files.held_fds(), vec![101, 102]);

    assert_eq!(h.broker.sandbox_exited(&first.key).await, 2);
    assert!(h.files.held_fds().is_empty());
}
