/*!
 * Services Module
 * Contracts of the external collaborators the broker drives
 *
 * Identity provider, DLP file service, sandbox manager, media lookup,
 * alert surface, and the requesting context are all consumed as black
 * boxes behind these traits.
 */

pub mod traits;
pub mod types;

pub use traits::{
    AlertPresenter, AssetLookup, DlpFile, DlpFileService, IdentityProvider, RequestContext,
    SandboxManager,
};
pub use types::{AccountInfo, FileAsset, LaunchRequest, SandboxTarget, SourceFd, UriGrant};
