/*!
 * DLP Sandbox Broker Library
 * Opens DLP-protected files inside sandboxed application instances
 *
 * The broker resolves the caller's permission tier from the file's policy,
 * picks or installs a sandbox instance, exposes the file through a
 * restricted link file, launches the sandbox, and keeps the registry of
 * live sessions used for reverse lookups and teardown.
 */

pub mod broker;
pub mod core;
pub mod link;
pub mod monitoring;
pub mod permissions;
pub mod services;
pub mod session;


// Re-exports
pub use broker::{BrokerServices, OpenOutcome, OpenRequest, Reuse, SandboxBroker};
pub use crate::core::{BrokerConfig, BrokerError, BrokerResult, SandboxKey};
pub use monitoring::{init_tracing, EventLog, Telemetry};
pub use permissions::{DlpPolicy, PermissionTier, PolicyResolver};
pub use session::{ReverseResolution, SharedRegistry};
