/*!
 * Core Types
 * Common types used across the broker
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric index of one sandbox instance of a bundle
pub type AppIndex = u32;

/// OS account user id
pub type UserId = i32;

/// UTC timestamp in milliseconds
pub type Millis = i64;

/// Common result type for broker operations
pub type BrokerResult<T> = Result<T, super::errors::BrokerError>;

/// Identity of one sandbox instance
///
/// Not unique per file: several link files may be opened into the same
/// instance over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxKey {
    pub bundle_name: String,
    pub app_index: AppIndex,
}

impl SandboxKey {
    pub fn new(bundle_name: impl Into<String>, app_index: AppIndex) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            app_index,
        }
    }
}

impl fmt::Display for SandboxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bundle_name, self.app_index)
    }
}

/// Which account name acts as the identity on this device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Enterprise domain account (desktop-class devices)
    Domain,
    /// Distributed account (phones)
    #[default]
    Distributed,
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(AccountKind::Domain),
            "distributed" => Ok(AccountKind::Distributed),
            other => Err(format!("unknown account kind '{}'", other)),
        }
    }
}
