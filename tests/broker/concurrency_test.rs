/*!
 * Concurrent Open Integration Tests
 */

use crate::fakes::{CountingContext, FileSpec, Harness, READER};
use dlp_sandbox_broker::broker::Reuse;
use dlp_sandbox_broker::permissions::GatheringPolicy;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const PLAN: &str = "file://docs/plan.xlsx.dlp";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_of_one_uri_share_a_session() {
    let h = Arc::new(Harness::new());
    *h.sandboxes.launch_delay.lock() = Some(Duration::from_millis(20));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move {
                let ctx = CountingContext::default();
                let result = h
                    .broker
                    .open_request(&Harness::request(PLAN, "plan.xlsx.dlp"), &ctx)
                    .await;
                (result, ctx.count())
            })
        })
        .collect();

    let mut fresh = 0;
    let mut reused = 0;
    for task in tasks {
        let (result, terminated) = task.await.unwrap();
        assert_eq!(terminated, 1);
        match result.unwrap().reuse {
            Reuse::Fresh => fresh += 1,
            Reuse::ExactUri => reused += 1,
            Reuse::Gathering => panic!("gathering is off"),
        }
    }

    assert_eq!(fresh, 1);
    assert_eq!(reused, 5);
    assert_eq!(h.sandboxes.installs.lock().len(), 1);
    assert_eq!(h.links_on_disk(), 1);

    let stats = h.broker.registry().stats();
    assert_eq!(stats.uris, 1);
    assert_eq!(stats.sessions, 1);
    assert!(h.broker.registry().is_consistent());
}

#[tokio::test]
async fn test_concurrent_opens_of_different_uris_both_commit() {
    let h = Harness::new();
    *h.sandboxes.launch_delay.lock() = Some(Duration::from_millis(10));

    let (a, b) = tokio::join!(
        h.open("file://docs/a.docx.dlp", "a.docx.dlp"),
        h.open("file://docs/b.docx.dlp", "b.docx.dlp"),
    );
    let (a, b) = (a.0.unwrap(), b.0.unwrap());

    assert_ne!(a.key, b.key);
    assert_eq!(h.broker.registry().stats().uris, 2);
    assert!(h.broker.registry().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gathering_opens_install_once() {
    let h = Arc::new(Harness::new());
    h.identity.login(READER);
    *h.sandboxes.launch_delay.lock() = Some(Duration::from_millis(20));
    let uris: Vec<String> = (0..4).map(|i| format!("file://docs/{}.docx.dlp", i)).collect();
    for uri in &uris {
        h.files.set(
            uri,
            FileSpec {
                gathering: GatheringPolicy::Gathering,
                link_mode: 0o400,
                ..FileSpec::default()
            },
        );
    }

    let tasks: Vec<_> = uris
        .iter()
        .enumerate()
        .map(|(i, uri)| {
            let h = h.clone();
            let uri = uri.clone();
            tokio::spawn(async move {
                let name = format!("{}.docx.dlp", i);
                h.open(&uri, &name).await.0.unwrap()
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    assert_eq!(h.sandboxes.installs.lock().len(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.reuse == Reuse::Fresh).count(), 1);
    assert!(outcomes.iter().all(|o| o.key == outcomes[0].key));

    let stats = h.broker.registry().stats();
    assert_eq!(stats.uris, 4);
    assert_eq!(stats.sandboxes, 1);
    assert_eq!(stats.gathering_tiers, 1);
    assert!(h.broker.registry().is_consistent());
}
