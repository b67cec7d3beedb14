/*!
 * Collaborator Traits
 * Black-box services consumed by the broker
 *
 * Every call is an async I/O boundary and a suspension point of the
 * request that makes it.
 */

use super::types::{AccountInfo, FileAsset, LaunchRequest, SourceFd};
use crate::core::errors::{AlertKind, ServiceError};
use crate::core::types::{AppIndex, UserId};
use crate::permissions::{DlpPolicy, GatheringPolicy, PermissionTier};
use async_trait::async_trait;
use std::sync::Arc;

/// Account identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_account(&self) -> Result<AccountInfo, ServiceError>;
}

/// Opened DLP file owned by the DLP file service
#[async_trait]
pub trait DlpFile: Send + Sync + std::fmt::Debug {
    /// Embedded permission table
    fn policy(&self) -> &DlpPolicy;

    async fn gathering_policy(&self) -> Result<GatheringPolicy, ServiceError>;

    /// Materialize `name` as a link file under the restricted mount
    async fn add_link(&self, name: &str) -> Result<(), ServiceError>;

    async fn delete_link(&self, name: &str) -> Result<(), ServiceError>;

    async fn close(&self) -> Result<(), ServiceError>;
}

/// DLP file service
#[async_trait]
pub trait DlpFileService: Send + Sync {
    /// Descriptor of the encrypted file behind `uri`
    async fn source_fd(&self, uri: &str) -> Result<SourceFd, ServiceError>;

    /// Parse and decrypt the file behind `fd`
    async fn open(&self, fd: SourceFd) -> Result<Arc<dyn DlpFile>, ServiceError>;

    /// Return a descriptor obtained from `source_fd`
    async fn release_fd(&self, fd: SourceFd) -> Result<(), ServiceError>;
}

/// Sandbox instance manager
#[async_trait]
pub trait SandboxManager: Send + Sync {
    /// Provision a new sandbox instance of `bundle` at `tier`
    async fn install(
        &self,
        bundle: &str,
        tier: PermissionTier,
        user_id: UserId,
        uri: &str,
    ) -> Result<AppIndex, ServiceError>;

    async fn launch(&self, request: &LaunchRequest) -> Result<(), ServiceError>;

    /// Start the broker's companion service after a successful launch
    async fn start_companion(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Media-library lookup
#[async_trait]
pub trait AssetLookup: Send + Sync {
    async fn asset_for(&self, uri: &str) -> Option<FileAsset>;
}

/// User-facing alert surface
#[async_trait]
pub trait AlertPresenter: Send + Sync {
    async fn present(&self, alert: AlertKind);
}

/// Context that issued one open request
pub trait RequestContext: Send + Sync {
    /// End the request context; called exactly once per request
    fn terminate(&self);
}
