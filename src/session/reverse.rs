/*!
 * Reverse Resolver
 * Maps a link file seen by a sandbox back to its DLP file and the
 * caller's current tier
 */

use super::registry::SharedRegistry;
use super::types::Session;
use crate::core::errors::{BrokerError, IdentityError};
use crate::core::types::{AccountKind, BrokerResult};
use crate::permissions::{PermissionResolver, PermissionTier};
use crate::services::{DlpFile, IdentityProvider};
use std::sync::Arc;
use tracing::{debug, error};

/// Answer to a reverse lookup
#[derive(Debug, Clone)]
pub struct ReverseResolution {
    pub file: Arc<dyn DlpFile>,
    /// Tier of the current identity, re-evaluated on every call
    pub tier: PermissionTier,
    pub session: Arc<Session>,
}

/// Link-name to file lookup with a fresh permission check
pub struct ReverseResolver {
    registry: SharedRegistry,
    identity: Arc<dyn IdentityProvider>,
    resolver: Arc<dyn PermissionResolver>,
    account_kind: AccountKind,
}

impl ReverseResolver {
    pub fn new(
        registry: SharedRegistry,
        identity: Arc<dyn IdentityProvider>,
        resolver: Arc<dyn PermissionResolver>,
        account_kind: AccountKind,
    ) -> Self {
        Self {
            registry,
            identity,
            resolver,
            account_kind,
        }
    }

    /// Resolve `link_name` for the currently logged-in identity
    ///
    /// Identity is fetched before the registry is consulted. A link no
    /// session owns is an internal inconsistency, not a user error.
    pub async fn resolve(&self, link_name: &str) -> BrokerResult<ReverseResolution> {
        let account = self
            .identity
            .current_account()
            .await
            .map_err(|e| IdentityError::Unavailable(e.reason()))?;
        let identity = account.identity(self.account_kind)?.to_string();

        let session = self.registry.find_by_link_name(link_name).ok_or_else(|| {
            error!(link_name = %link_name, "link file has no registered session");
            BrokerError::RegistryInconsistency {
                link_name: link_name.to_string(),
            }
        })?;

        let tier = self
            .resolver
            .resolve(&identity, session.file.policy())
            .ensure_grantable()?;
        debug!(
            link_name = %link_name,
            sandbox = %session.key,
            tier = %tier,
            "link resolved"
        );

        Ok(ReverseResolution {
            file: session.file.clone(),
            tier,
            session,
        })
    }
}

impl std::fmt::Debug for ReverseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseResolver")
            .field("account_kind", &self.account_kind)
            .finish_non_exhaustive()
    }
}
