/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::monitoring::EventCode;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error reported by an external collaborator (DLP service, sandbox manager, ...)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("service error {code}: {message}")]
pub struct ServiceError {
    pub code: i32,
    pub message: String,
    /// Extra detail forwarded to telemetry as the fault reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ServiceError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Reason string for telemetry: `data` when present, else the message
    pub fn reason(&self) -> String {
        self.data.clone().unwrap_or_else(|| self.message.clone())
    }
}

/// Account resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum IdentityError {
    #[error("account information unavailable: {0}")]
    #[diagnostic(
        code(identity::unavailable),
        help("The account service did not answer. Retry after the account service is up.")
    )]
    Unavailable(String),

    #[error("no logged-in account")]
    #[diagnostic(
        code(identity::not_logged_in),
        help("Log in with an account that the file was shared with.")
    )]
    NotLoggedIn,
}

/// Step of link provisioning that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStage {
    /// Original file name cannot yield a secondary suffix
    Validate,
    /// DLP service refused to materialize the link
    Create,
    /// Link could not be found or stat'ed under the restricted mount
    Resolve,
    /// Link descriptor could not be opened
    Open,
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkStage::Validate => "validate",
            LinkStage::Create => "create",
            LinkStage::Resolve => "resolve",
            LinkStage::Open => "open",
        };
        f.write_str(name)
    }
}

/// Link file provisioning failure, tagged with the failing stage
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("link {stage} failed: {reason}")]
pub struct LinkError {
    pub stage: LinkStage,
    pub reason: String,
}

impl LinkError {
    pub fn new(stage: LinkStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// User-visible alert raised for a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "alert", content = "details")]
pub enum AlertKind {
    /// Request parameters were missing or malformed
    ParamError,
    /// Account lookup failed
    GetAccountError,
    /// No account is logged in
    NoAccountError,
    /// Media asset for the original file could not be found
    GetFileAssetError,
    /// Generic internal error
    InsideError,
    /// Error reported verbatim by a collaborator service
    Service(ServiceError),
}

/// Unified broker error type with miette diagnostics
///
/// Every variant is terminal for the request that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum BrokerError {
    #[error("Invalid request: {0}")]
    #[diagnostic(
        code(broker::invalid_request),
        help("The open request is missing a required parameter.")
    )]
    InvalidRequest(String),

    #[error("Identity error: {0}")]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),

    #[error("Cannot open DLP file: {0}")]
    #[diagnostic(
        code(broker::file_open),
        help("The file is corrupted or not encrypted for this account.")
    )]
    FileOpen(ServiceError),

    #[error("Resolved permission tier {0} is outside [read_only, full_control]")]
    #[diagnostic(
        code(broker::internal_policy),
        help("The policy resolved to an unusable tier. This is a defect, please report it.")
    )]
    InternalPolicy(u32),

    #[error("Sandbox install failed: {0}")]
    #[diagnostic(
        code(broker::sandbox_install),
        help("The sandbox manager refused to provision an instance.")
    )]
    SandboxInstall(ServiceError),

    #[error("Link creation failed: {0}")]
    #[diagnostic(
        code(broker::link_creation),
        help("The DLP service could not expose the file to the sandbox.")
    )]
    LinkCreation(#[from] LinkError),

    #[error("No media asset for {uri}")]
    #[diagnostic(
        code(broker::asset_resolution),
        help("The original file is not indexed by the media library.")
    )]
    AssetResolution { uri: String },

    #[error("Sandbox launch failed: {0}")]
    #[diagnostic(
        code(broker::sandbox_launch),
        help("The sandboxed application could not be started.")
    )]
    SandboxLaunch(ServiceError),

    #[error("No registered session owns link file {link_name}")]
    #[diagnostic(
        code(broker::registry_inconsistency),
        help("A sandbox referenced a link the broker never registered. This is a defect.")
    )]
    RegistryInconsistency { link_name: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(broker::configuration),
        help("Review the DLP_BROKER_* environment variables or configuration file.")
    )]
    Configuration(String),
}

impl BrokerError {
    /// Telemetry fault code this error must be reported with, if any
    pub fn fault_code(&self) -> Option<EventCode> {
        match self {
            BrokerError::FileOpen(_) => Some(EventCode::FileParseError),
            BrokerError::SandboxInstall(_) | BrokerError::LinkCreation(_) => {
                Some(EventCode::InstallSandboxError)
            }
            BrokerError::SandboxLaunch(_) => Some(EventCode::StartSandboxError),
            _ => None,
        }
    }

    /// Reason string attached to fault telemetry
    pub fn fault_reason(&self) -> Option<String> {
        match self {
            BrokerError::FileOpen(e)
            | BrokerError::SandboxInstall(e)
            | BrokerError::SandboxLaunch(e) => e.data.clone(),
            BrokerError::LinkCreation(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Alert surfaced to the user for this error
    pub fn alert(&self) -> AlertKind {
        match self {
            BrokerError::InvalidRequest(_) => AlertKind::ParamError,
            BrokerError::Identity(IdentityError::Unavailable(_)) => AlertKind::GetAccountError,
            BrokerError::Identity(IdentityError::NotLoggedIn) => AlertKind::NoAccountError,
            BrokerError::FileOpen(e) => AlertKind::Service(e.clone()),
            BrokerError::AssetResolution { .. } => AlertKind::GetFileAssetError,
            BrokerError::InternalPolicy(_)
            | BrokerError::SandboxInstall(_)
            | BrokerError::LinkCreation(_)
            | BrokerError::SandboxLaunch(_)
            | BrokerError::RegistryInconsistency { .. }
            | BrokerError::Configuration(_) => AlertKind::InsideError,
        }
    }
}
