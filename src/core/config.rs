/*!
 * Broker Configuration
 *
 * Defaults, JSON documents, and `DLP_BROKER_*` environment overrides.
 */

use super::errors::BrokerError;
use super::limits::{DEFAULT_LINK_MOUNT_PREFIX, DEFAULT_SLOW_STAGE, DEFAULT_URI_AUTHORITY};
use super::types::{AccountKind, BrokerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_LINK_MOUNT: &str = "DLP_BROKER_LINK_MOUNT";
pub const ENV_URI_AUTHORITY: &str = "DLP_BROKER_URI_AUTHORITY";
pub const ENV_ACCOUNT_KIND: &str = "DLP_BROKER_ACCOUNT_KIND";
pub const ENV_SLOW_STAGE_MS: &str = "DLP_BROKER_SLOW_STAGE_MS";

/// Broker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BrokerConfig {
    /// Restricted mount holding materialized link files
    pub link_mount_prefix: PathBuf,
    /// Authority of shareable `file://` link URIs
    pub link_uri_authority: String,
    /// Account name used as the identity
    pub account_kind: AccountKind,
    /// Stage duration above which a warning is logged
    pub slow_stage_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            link_mount_prefix: PathBuf::from(DEFAULT_LINK_MOUNT_PREFIX),
            link_uri_authority: DEFAULT_URI_AUTHORITY.to_string(),
            account_kind: AccountKind::default(),
            slow_stage_ms: DEFAULT_SLOW_STAGE.as_millis() as u64,
        }
    }
}

impl BrokerConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> BrokerResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> BrokerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BrokerError::Configuration(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DLP_BROKER_*` overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> BrokerResult<Self> {
        if let Ok(prefix) = std::env::var(ENV_LINK_MOUNT) {
            self.link_mount_prefix = PathBuf::from(prefix);
        }
        if let Ok(authority) = std::env::var(ENV_URI_AUTHORITY) {
            self.link_uri_authority = authority;
        }
        if let Ok(kind) = std::env::var(ENV_ACCOUNT_KIND) {
            self.account_kind = kind.parse().map_err(BrokerError::Configuration)?;
        }
        if let Ok(ms) = std::env::var(ENV_SLOW_STAGE_MS) {
            self.slow_stage_ms = ms.trim().parse().map_err(|e| {
                BrokerError::Configuration(format!("{} must be an integer: {}", ENV_SLOW_STAGE_MS, e))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_link_mount_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.link_mount_prefix = prefix.into();
        self
    }

    pub fn slow_stage(&self) -> Duration {
        Duration::from_millis(self.slow_stage_ms)
    }

    fn validate(&self) -> BrokerResult<()> {
        if !self.link_mount_prefix.is_absolute() {
            return Err(BrokerError::Configuration(format!(
                "link mount prefix must be absolute, got {}",
                self.link_mount_prefix.display()
            )));
        }
        if self.link_uri_authority.trim().is_empty() {
            return Err(BrokerError::Configuration(
                "link URI authority must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
