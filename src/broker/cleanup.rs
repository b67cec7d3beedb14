/*!
 * Session Cleanup
 * Releases link descriptors, link files, DLP files, and source descriptors
 *
 * Each step runs regardless of earlier failures; failures are logged and
 * never replace the error that triggered cleanup.
 */

use crate::link::LinkFile;
use crate::services::{DlpFile, DlpFileService, SourceFd};
use crate::session::Session;
use tracing::{debug, warn};

/// Close the link descriptor
pub(super) fn close_descriptor(link: &LinkFile) {
    if let Err(e) = link.descriptor.close() {
        warn!(link_name = %link.name, error = %e, "Failed to close link descriptor");
    }
}

/// Ask the DLP service to delete the link file
pub(super) async fn delete_link(file: &dyn DlpFile, link_name: &str) {
    if let Err(e) = file.delete_link(link_name).await {
        warn!(link_name = %link_name, error = %e, "Failed to delete link file");
    }
}

/// Close the DLP file
pub(super) async fn close_file(file: &dyn DlpFile) {
    if let Err(e) = file.close().await {
        warn!(error = %e, "Failed to close DLP file");
    }
}

/// Hand the source descriptor back to the DLP file service
pub(super) async fn release_source(files: &dyn DlpFileService, fd: SourceFd) {
    if let Err(e) = files.release_fd(fd).await {
        warn!(fd, error = %e, "Failed to release source descriptor");
    }
}

/// Close the DLP file, then release the descriptor it was opened from
pub(super) async fn close_source(files: &dyn DlpFileService, file: &dyn DlpFile, fd: SourceFd) {
    close_file(file).await;
    release_source(files, fd).await;
}

/// Release everything a link-backed request holds
pub(super) async fn release_link(
    files: &dyn DlpFileService,
    file: &dyn DlpFile,
    link: &LinkFile,
    fd: SourceFd,
) {
    close_descriptor(link);
    delete_link(file, &link.name).await;
    close_source(files, file, fd).await;
    debug!(link_name = %link.name, "Link resources released");
}

/// Release a session removed from the registry
pub(super) async fn release_session(files: &dyn DlpFileService, session: &Session) {
    release_link(files, session.file.as_ref(), &session.link, session.source_fd).await;
}
