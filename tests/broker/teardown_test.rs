/*!
 * Session Teardown Integration Tests
 */

use crate::fakes::{FileSpec, Harness, READER};
use dlp_sandbox_broker::broker::Reuse;
use dlp_sandbox_broker::permissions::GatheringPolicy;
use dlp_sandbox_broker::session::RegistryStats;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;

const A: &str = "file://docs/a.docx.dlp";
const B: &str = "file://docs/b.docx.dlp";

#[tokio::test]
async fn test_close_link_releases_session() {
    let h = Harness::new();
    let outcome = h.open(A, "a.docx.dlp").await.0.unwrap();
    assert_eq!(h.links_on_disk(), 1);

    let summary = h
        .broker
        .close_link(&outcome.key, &outcome.link_name)
        .await
        .unwrap();
    assert_eq!(summary.uri, A);
    assert_eq!(h.broker.registry().stats(), RegistryStats::default());
    assert_eq!(h.links_on_disk(), 0);

    let file = &h.files.opened_for(A)[0];
    assert_eq!(file.deleted.lock().clone(), vec![outcome.link_name.clone()]);
    assert!(file.closed.load(Ordering::SeqCst));

    assert!(h
        .broker
        .close_link(&outcome.key, &outcome.link_name)
        .await
        .is_none());
}

#[tokio::test]
async fn test_reopen_after_close_provisions_again() {
    let h = Harness::new();
    let first = h.open(A, "a.docx.dlp").await.0.unwrap();
    h.broker.close_link(&first.key, &first.link_name).await;

    let second = h.open(A, "a.docx.dlp").await.0.unwrap();
    assert_eq!(second.reuse, Reuse::Fresh);
    assert_ne!(second.link_name, first.link_name);
    assert_eq!(h.sandboxes.installs.lock().len(), 2);
}

#[tokio::test]
async fn test_sandbox_exit_releases_every_session() {
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
    let second = h.open(B, "b.docx.dlp").await.0.unwrap();
    assert_eq!(second.key, first.key);

    assert_eq!(h.broker.sandbox_exited(&first.key).await, 2);
    assert_eq!(h.broker.registry().stats(), RegistryStats::default());
    assert_eq!(h.links_on_disk(), 0);
    for uri in [A, B] {
        assert!(h.files.opened_for(uri)[0].closed.load(Ordering::SeqCst));
    }

    // The tier route went away with the instance
    let third = h.open(A, "a.docx.dlp").await.0.unwrap();
    assert_eq!(third.reuse, Reuse::Fresh);
    assert_eq!(h.broker.sandbox_exited(&first.key).await, 0);
}
