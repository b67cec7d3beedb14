/*!
 * Session Module
 * Registry of launched sandbox sessions and link-name reverse lookup
 */

pub mod registry;
pub mod reverse;
pub mod types;

pub use registry::{SessionRegistry, SharedRegistry};
pub use reverse::{ReverseResolution, ReverseResolver};
pub use types::{CommitOutcome, RegistryStats, Session, SessionSummary};
