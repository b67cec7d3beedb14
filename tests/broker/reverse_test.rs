/*!
 * Reverse Resolution Integration Tests
 */

use crate::fakes::{Harness, OWNER, READER};
use dlp_sandbox_broker::core::{BrokerError, ServiceError, IdentityError};
use dlp_sandbox_broker::permissions::PermissionTier;
use dlp_sandbox_broker::services::DlpFile;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const PLAN: &str = "file://docs/plan.xlsx.dlp";

#[tokio::test]
async fn test_reverse_lookup_uses_current_identity() {
    let h = Harness::new();
    h.identity.login(OWNER);
    let outcome = h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    h.identity.login(READER);
    let resolved = h.broker.reverse_resolve(&outcome.link_name).await.unwrap();
    assert_eq!(resolved.tier, PermissionTier::ReadOnly);
    assert_eq!(resolved.session.uri, PLAN);
    assert_eq!(resolved.session.key, outcome.key);
    // Tier cached at open time is untouched
    assert_eq!(resolved.session.tier, PermissionTier::FullControl);

    let opened: Arc<dyn DlpFile> = h.files.opened_for(PLAN)[0].clone();
    assert!(Arc::ptr_eq(&resolved.file, &opened));
}

#[tokio::test]
async fn test_unknown_link_is_registry_inconsistency() {
    let h = Harness::new();
    h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    let err = h
        .broker
        .reverse_resolve("com.example.viewer_9_1.docx.dlp.link")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BrokerError::RegistryInconsistency {
            link_name: "com.example.viewer_9_1.docx.dlp.link".to_string()
        }
    );
}

#[tokio::test]
async fn test_closed_link_no_longer_resolves() {
    let h = Harness::new();
    let outcome = h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    h.broker.close_link(&outcome.key, &outcome.link_name).await.unwrap();
    let err = h.broker.reverse_resolve(&outcome.link_name).await.unwrap_err();
    assert!(matches!(err, BrokerError::RegistryInconsistency { .. }));
}

#[tokio::test]
async fn test_reverse_lookup_rejects_ungranted_identity() {
    let h = Harness::new();
    let outcome = h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    h.identity.login("stranger@corp");
    let err = h.broker.reverse_resolve(&outcome.link_name).await.unwrap_err();
    assert_eq!(err, BrokerError::InternalPolicy(0));
}

#[tokio::test]
async fn test_reverse_lookup_needs_identity() {
    let h = Harness::new();
    let outcome = h.open(PLAN, "plan.xlsx.dlp").await.0.unwrap();

    h.identity.set(Err(ServiceError::new(12300001, "down")));
    let err = h.broker.reverse_resolve(&outcome.link_name).await.unwrap_err();
    assert_eq!(
        err,
        BrokerError::Identity(IdentityError::Unavailable("down".to_string()))
    );
}
