/*!
 * Permissions Module
 * Permission tiers, DLP policy tables, and tier resolution
 *
 * ## Usage
 * ```ignore
 * use dlp_sandbox_broker::permissions::{PermissionResolver, PolicyResolver};
 *
 * let tier = PolicyResolver.resolve("alice@corp", file.policy());
 * let tier = tier.ensure_grantable()?;
 * ```
 */

pub mod resolver;
pub mod types;

pub use resolver::{PermissionResolver, PolicyResolver};
pub use types::{AuthorizedUser, DlpPolicy, GatheringPolicy, PermissionTier};
