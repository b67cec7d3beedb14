/*!
 * Session Types
 */

use crate::core::types::SandboxKey;
use crate::link::LinkFile;
use crate::permissions::PermissionTier;
use crate::services::{DlpFile, SourceFd};
use serde::Serialize;
use std::sync::Arc;

/// One link file opened into one sandbox instance
///
/// Only registered after its sandbox launch succeeded.
#[derive(Debug)]
pub struct Session {
    /// URI of the encrypted original
    pub uri: String,
    pub file: Arc<dyn DlpFile>,
    pub link: LinkFile,
    /// Released together with `file` on teardown
    pub source_fd: SourceFd,
    pub key: SandboxKey,
    /// Tier of the identity that opened the file
    pub tier: PermissionTier,
}

impl Session {
    #[inline]
    pub fn link_name(&self) -> &str {
        &self.link.name
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            uri: self.uri.clone(),
            link_name: self.link.name.clone(),
            key: self.key.clone(),
            tier: self.tier,
            writable: self.link.writable(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionSummary {
    pub uri: String,
    pub link_name: String,
    pub key: SandboxKey,
    pub tier: PermissionTier,
    pub writable: bool,
}

/// Result of committing a session
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// First registration of the URI
    Inserted,
    /// Same session committed again (exact-URI reuse)
    Refreshed,
    /// A different session already owned the URI and was displaced
    Replaced(Arc<Session>),
}

/// Registry size counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub uris: usize,
    pub sandboxes: usize,
    pub sessions: usize,
    pub gathering_tiers: usize,
}
