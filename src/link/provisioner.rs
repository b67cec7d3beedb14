/*!
 * Link File Provisioner
 *
 * Derives the link name, asks the DLP service to materialize it, then
 * re-derives writability from the created link's mode bits and opens the
 * descriptor in exactly that mode.
 */

use super::descriptor::LinkDescriptor;
use crate::core::clock::Clock;
use crate::core::config::BrokerConfig;
use crate::core::errors::{LinkError, LinkStage};
use crate::core::limits::{LINK_FILE_SUFFIX, OWNER_WRITE_BIT, SECONDARY_SUFFIX_INDEX};
use crate::core::types::{Millis, SandboxKey};
use crate::services::DlpFile;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Link file a sandbox opens instead of the original
#[derive(Debug)]
pub struct LinkFile {
    pub name: String,
    pub path: PathBuf,
    /// Shareable URI passed in launch parameters
    pub uri: String,
    pub descriptor: LinkDescriptor,
}

impl LinkFile {
    /// Writability of the opened descriptor
    #[inline]
    pub fn writable(&self) -> bool {
        self.descriptor.writable()
    }
}

/// Build `{bundle}_{index}_{millis}.{secondSuffix}.dlp.link`
///
/// The secondary suffix is the second-to-last dot segment of the original
/// name, so names with fewer than three segments are rejected.
pub fn link_file_name(
    key: &SandboxKey,
    timestamp: Millis,
    original_name: &str,
) -> Result<String, LinkError> {
    let segments: Vec<&str> = original_name.split('.').collect();
    if segments.len() <= SECONDARY_SUFFIX_INDEX {
        return Err(LinkError::new(
            LinkStage::Validate,
            format!("'{}' has no secondary suffix", original_name),
        ));
    }
    let suffix = segments[segments.len() - SECONDARY_SUFFIX_INDEX];
    if suffix.is_empty() {
        return Err(LinkError::new(
            LinkStage::Validate,
            format!("'{}' has an empty secondary suffix", original_name),
        ));
    }

    let name = format!(
        "{}_{}_{}.{}{}",
        key.bundle_name, key.app_index, timestamp, suffix, LINK_FILE_SUFFIX
    );
    if name.contains('/') || name.contains('\0') {
        return Err(LinkError::new(
            LinkStage::Validate,
            format!("'{}' is not a plain file name", name),
        ));
    }
    Ok(name)
}

/// Creates link files for sandbox sessions
pub struct LinkProvisioner {
    mount_prefix: PathBuf,
    uri_authority: String,
    clock: Arc<dyn Clock>,
    /// Last timestamp used in a link name
    last_stamp: AtomicI64,
}

impl LinkProvisioner {
    pub fn new(config: &BrokerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            mount_prefix: config.link_mount_prefix.clone(),
            uri_authority: config.link_uri_authority.clone(),
            clock,
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Clock reading, bumped past every stamp already handed out
    fn next_stamp(&self) -> Millis {
        let now = self.clock.now_millis();
        let mut stamp = now;
        let _ = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                stamp = now.max(last + 1);
                Some(stamp)
            });
        stamp
    }

    /// Create, resolve, and open a link for `file` inside `key`
    ///
    /// Nothing is left behind on failure: a link created before a later
    /// stage fails is deleted again.
    pub async fn provision(
        &self,
        file: &dyn DlpFile,
        key: &SandboxKey,
        original_name: &str,
    ) -> Result<LinkFile, LinkError> {
        let name = link_file_name(key, self.next_stamp(), original_name)?;

        file.add_link(&name)
            .await
            .map_err(|e| LinkError::new(LinkStage::Create, e.reason()))?;
        debug!(link_name = %name, sandbox = %key, "link materialized");

        match self.open_link(&name).await {
            Ok(link) => {
                info!(
                    link_name = %link.name,
                    writable = link.writable(),
                    sandbox = %key,
                    "link provisioned"
                );
                Ok(link)
            }
            Err(e) => {
                if let Err(delete_err) = file.delete_link(&name).await {
                    warn!(link_name = %name, error = %delete_err, "delete of unusable link failed");
                }
                Err(e)
            }
        }
    }

    /// Shareable URI of a path under the restricted mount
    pub fn link_uri(&self, path: &Path) -> String {
        format!("file://{}{}", self.uri_authority, path.display())
    }

    async fn open_link(&self, name: &str) -> Result<LinkFile, LinkError> {
        let path = self.mount_prefix.join(name);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            LinkError::new(LinkStage::Resolve, format!("{}: {}", path.display(), e))
        })?;
        let owner_writable = metadata.permissions().mode() & OWNER_WRITE_BIT != 0;

        let descriptor = LinkDescriptor::open(&path, owner_writable)
            .await
            .map_err(|e| LinkError::new(LinkStage::Open, format!("{}: {}", path.display(), e)))?;
        let uri = self.link_uri(&path);

        Ok(LinkFile {
            name: name.to_string(),
            path,
            uri,
            descriptor,
        })
    }
}

impl std::fmt::Debug for LinkProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkProvisioner")
            .field("mount_prefix", &self.mount_prefix)
            .field("uri_authority", &self.uri_authority)
            .finish_non_exhaustive()
    }
}
