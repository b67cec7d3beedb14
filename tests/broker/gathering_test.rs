/*!
 * Gathering Policy Integration Tests
 */

use crate::fakes::{CountingContext, FileSpec, Harness, EDITOR, READER, VIEWER};
use dlp_sandbox_broker::broker::{OpenRequest, Reuse};
use dlp_sandbox_broker::core::SandboxKey;
use dlp_sandbox_broker::monitoring::EventCode;
use dlp_sandbox_broker::permissions::{GatheringPolicy, PermissionTier};
use dlp_sandbox_broker::services::SandboxTarget;
use pretty_assertions::assert_eq;

const A: &str = "file://docs/a.docx.dlp";
const B: &str = "file://docs/b.docx.dlp";

fn harness(gathering: GatheringPolicy) -> Harness {
    let h = Harness::new();
    for uri in [A, B] {
        h.files.set(
            uri,
            FileSpec {
                gathering,
                link_mode: 0o400,
                ..FileSpec::default()
            },
        );
    }
    h
}

#[tokio::test]
async fn test_gathering_routes_same_tier_into_one_sandbox() {
    let h = harness(GatheringPolicy::Gathering);
    h.identity.login(READER);

    let first = h.open(A, "a.docx.dlp").await.0.unwrap();
    let second = h.open(B, "b.docx.dlp").await.0.unwrap();

    assert_eq!(first.reuse, Reuse::Fresh);
    assert_eq!(second.reuse, Reuse::Gathering);
    assert_eq!(second.key, first.key);
    assert_ne!(second.link_name, first.link_name);

    assert_eq!(h.sandboxes.installs.lock().len(), 1);
    assert_eq!(h.links_on_disk(), 2);
    assert_eq!(h.events.count(EventCode::InstallSandboxSuccess), 1);
    assert_eq!(h.events.count(EventCode::StartSandboxSuccess), 2);

    let stats = h.broker.registry().stats();
    assert_eq!(stats.uris, 2);
    assert_eq!(stats.sandboxes, 1);
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.gathering_tiers, 1);
}

#[tokio::test]
async fn test_without_gathering_every_file_gets_a_sandbox() {
    let h = harness(GatheringPolicy::NonGathering);
    h.identity.login(READER);

    let first = h.open(A, "a.docx.dlp").await.0.unwrap();
    let second = h.open(B, "b.docx.dlp").await.0.unwrap();

    assert_eq!(second.reuse, Reuse::Fresh);
    assert_eq!(first.key, SandboxKey::new(VIEWER, 1));
    assert_eq!(second.key, SandboxKey::new(VIEWER, 2));
    assert_eq!(h.sandboxes.installs.lock().len(), 2);
    assert_eq!(h.broker.registry().stats().gathering_tiers, 0);
}

#[tokio::test]
async fn test_gathering_does_not_cross_tiers() {
    let h = harness(GatheringPolicy::Gathering);

    h.identity.login(READER);
    let first = h.open(A, "a.docx.dlp").await.0.unwrap();
    h.identity.login(EDITOR);
    let second = h.open(B, "b.docx.dlp").await.0.unwrap();

    assert_eq!(second.tier, PermissionTier::ContentEdit);
    assert_eq!(second.reuse, Reuse::Fresh);
    assert_ne!(second.key, first.key);
    assert_eq!(h.broker.registry().stats().gathering_tiers, 2);
}

#[tokio::test]
async fn test_gathering_does_not_cross_bundles() {
    let h = harness(GatheringPolicy::Gathering);
    h.identity.login(READER);

    let first = h.open(A, "a.docx.dlp").await.0.unwrap();

    let ctx = CountingContext::default();
    let request = OpenRequest::new(
        B,
        "b.docx.dlp",
        SandboxTarget::new("com.example.editor", "EditAbility", "entry"),
    );
    let second = h.broker.open_request(&request, &ctx).await.unwrap();

    assert_eq!(second.reuse, Reuse::Fresh);
    assert_eq!(second.key.bundle_name, "com.example.editor");
    assert_ne!(second.key, first.key);
    assert_eq!(ctx.count(), 1);
}
