/*!
 * Permission Types
 * Access tiers and the per-file DLP policy
 */

use crate::core::errors::BrokerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered access level granted on a DLP file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PermissionTier {
    None = 0,
    ReadOnly = 1,
    ContentEdit = 2,
    FullControl = 3,
}

impl PermissionTier {
    /// Raw access code
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Tiers a sandbox may be launched with
    #[inline]
    pub fn is_grantable(self) -> bool {
        (PermissionTier::ReadOnly..=PermissionTier::FullControl).contains(&self)
    }

    /// Reject tiers no sandbox may be launched with
    pub fn ensure_grantable(self) -> Result<Self, BrokerError> {
        if self.is_grantable() {
            Ok(self)
        } else {
            Err(BrokerError::InternalPolicy(self.code()))
        }
    }

    /// Launch security flag: asserted only for strictly read-only access
    #[inline]
    pub fn security_flag(self) -> bool {
        self == PermissionTier::ReadOnly
    }
}

impl TryFrom<u32> for PermissionTier {
    type Error = BrokerError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PermissionTier::None),
            1 => Ok(PermissionTier::ReadOnly),
            2 => Ok(PermissionTier::ContentEdit),
            3 => Ok(PermissionTier::FullControl),
            other => Err(BrokerError::InternalPolicy(other)),
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionTier::None => "none",
            PermissionTier::ReadOnly => "read_only",
            PermissionTier::ContentEdit => "content_edit",
            PermissionTier::FullControl => "full_control",
        };
        f.write_str(name)
    }
}

/// Whether files at the same tier share one sandbox instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatheringPolicy {
    #[default]
    NonGathering,
    Gathering,
}

impl GatheringPolicy {
    #[inline]
    pub fn is_gathering(self) -> bool {
        self == GatheringPolicy::Gathering
    }
}

/// One explicit grant in a policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthorizedUser {
    pub account: String,
    pub tier: PermissionTier,
}

/// Per-identity permission table embedded in a DLP file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DlpPolicy {
    /// Account that encrypted the file
    pub owner_account: String,
    /// Explicit per-account grants
    pub authorized_users: Vec<AuthorizedUser>,
    /// Grant for any logged-in account not listed explicitly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub everyone: Option<PermissionTier>,
    /// Contact shown to users asking for more access
    pub contract_account: String,
}

impl DlpPolicy {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            contract_account: owner.clone(),
            owner_account: owner,
            ..Default::default()
        }
    }

    pub fn grant(mut self, account: impl Into<String>, tier: PermissionTier) -> Self {
        self.authorized_users.push(AuthorizedUser {
            account: account.into(),
            tier,
        });
        self
    }

    pub fn grant_everyone(mut self, tier: PermissionTier) -> Self {
        self.everyone = Some(tier);
        self
    }
}
