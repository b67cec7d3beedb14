/*!
 * Open Request Types
 * Inputs, states, and outcomes of the open-request state machine
 */

use crate::core::errors::BrokerError;
use crate::core::types::SandboxKey;
use crate::permissions::PermissionTier;
use crate::services::types::require;
use crate::services::SandboxTarget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to open one DLP file inside a sandboxed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OpenRequest {
    /// URI of the encrypted original
    pub uri: String,
    /// Display name of the original, used to derive the link suffix
    pub file_name: String,
    pub target: SandboxTarget,
}

impl OpenRequest {
    pub fn new(uri: impl Into<String>, file_name: impl Into<String>, target: SandboxTarget) -> Self {
        Self {
            uri: uri.into(),
            file_name: file_name.into(),
            target,
        }
    }

    /// Reject missing parameters before any side effect
    pub fn validate(&self) -> Result<(), BrokerError> {
        require("uri", &self.uri)?;
        require("file_name", &self.file_name)?;
        self.target.validate()
    }
}

/// Position of an open request in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenState {
    Start,
    PermissionResolved,
    FileOpened,
    SessionResolved,
    Linked,
    Launching,
    Committed,
    Failed,
}

impl fmt::Display for OpenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenState::Start => "start",
            OpenState::PermissionResolved => "permission_resolved",
            OpenState::FileOpened => "file_opened",
            OpenState::SessionResolved => "session_resolved",
            OpenState::Linked => "linked",
            OpenState::Launching => "launching",
            OpenState::Committed => "committed",
            OpenState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the sandbox instance for a request was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reuse {
    /// URI already had a session; its instance and link were reused
    ExactUri,
    /// Routed into the instance of another file at the same tier
    Gathering,
    /// New instance installed for this request
    Fresh,
}

/// Successful open result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OpenOutcome {
    pub key: SandboxKey,
    pub link_name: String,
    pub link_uri: String,
    pub writable: bool,
    pub tier: PermissionTier,
    pub reuse: Reuse,
}
