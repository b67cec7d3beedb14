/*!
 * Broker Module
 * Open-request orchestration and session teardown
 *
 * ## Usage
 * ```ignore
 * use dlp_sandbox_broker::broker::{BrokerServices, OpenRequest, SandboxBroker};
 *
 * let broker = SandboxBroker::builder(services)
 *     .with_config(BrokerConfig::from_env()?)
 *     .build();
 * let outcome = broker.open_request(&request, &ctx).await?;
 * ```
 */

mod cleanup;
pub mod key_lock;
pub mod orchestrator;
pub mod request;

pub use key_lock::{KeyGuard, KeyLocks};
pub use orchestrator::{BrokerServices, SandboxBroker, SandboxBrokerBuilder};
pub use request::{OpenOutcome, OpenRequest, OpenState, Reuse};
