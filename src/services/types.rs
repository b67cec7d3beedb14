/*!
 * Collaborator Types
 * Values exchanged with the external services the broker drives
 */

use crate::core::errors::{BrokerError, IdentityError};
use crate::core::types::{AccountKind, SandboxKey, UserId};
use serde::{Deserialize, Serialize};

/// Raw descriptor of the encrypted source file
pub type SourceFd = i32;

/// Account snapshot from the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AccountInfo {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed_account: Option<String>,
    pub logged_in: bool,
}

impl AccountInfo {
    /// Identity name for this device class
    pub fn identity(&self, kind: AccountKind) -> Result<&str, IdentityError> {
        if !self.logged_in {
            return Err(IdentityError::NotLoggedIn);
        }
        let name = match kind {
            AccountKind::Domain => self.domain_account.as_deref(),
            AccountKind::Distributed => self.distributed_account.as_deref(),
        };
        match name {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(IdentityError::NotLoggedIn),
        }
    }
}

/// Media-library metadata of the original file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileAsset {
    pub display_name: String,
    pub relative_path: String,
    pub media_type: i32,
    pub date_modified: i64,
}

/// Application the caller wants the file opened in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxTarget {
    pub bundle_name: String,
    pub ability_name: String,
    pub module_name: String,
}

impl SandboxTarget {
    pub fn new(
        bundle_name: impl Into<String>,
        ability_name: impl Into<String>,
        module_name: impl Into<String>,
    ) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            ability_name: ability_name.into(),
            module_name: module_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        require("bundle_name", &self.bundle_name)?;
        require("ability_name", &self.ability_name)?;
        require("module_name", &self.module_name)
    }
}

/// URI access granted to the launched sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriGrant {
    Read,
    Write,
}

impl UriGrant {
    pub fn for_writable(writable: bool) -> Self {
        if writable {
            UriGrant::Write
        } else {
            UriGrant::Read
        }
    }
}

/// Everything the sandbox manager needs to launch the viewer/editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LaunchRequest {
    pub sandbox: SandboxKey,
    pub ability_name: String,
    pub module_name: String,
    pub link_name: String,
    pub link_uri: String,
    pub link_writable: bool,
    pub uri_grant: UriGrant,
    /// URI of the encrypted original
    pub original_uri: String,
    pub asset: FileAsset,
    /// Asserted only for strictly read-only access
    pub security_flag: bool,
}

impl LaunchRequest {
    pub fn validate(&self) -> Result<(), BrokerError> {
        require("bundle_name", &self.sandbox.bundle_name)?;
        require("ability_name", &self.ability_name)?;
        require("module_name", &self.module_name)?;
        require("link_name", &self.link_name)?;
        require("link_uri", &self.link_uri)?;
        require("original_uri", &self.original_uri)?;
        if self.uri_grant != UriGrant::for_writable(self.link_writable) {
            return Err(BrokerError::InvalidRequest(
                "uri grant does not match link writability".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), BrokerError> {
    if value.trim().is_empty() {
        Err(BrokerError::InvalidRequest(format!("missing {}", field)))
    } else {
        Ok(())
    }
}
