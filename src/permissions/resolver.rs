/*!
 * Permission Resolver
 * Maps (identity, file policy) to a permission tier
 */

use super::types::{DlpPolicy, PermissionTier};

/// Pure tier resolution
///
/// Implementations may return any tier including `None`; range checks are
/// the caller's job.
pub trait PermissionResolver: Send + Sync {
    fn resolve(&self, identity: &str, policy: &DlpPolicy) -> PermissionTier;
}

/// Resolver over the policy table embedded in the file
///
/// Owner first, then explicit grants, then the everyone grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver;

impl PermissionResolver for PolicyResolver {
    fn resolve(&self, identity: &str, policy: &DlpPolicy) -> PermissionTier {
        if identity.is_empty() {
            return PermissionTier::None;
        }
        if policy.owner_account == identity {
            return PermissionTier::FullControl;
        }
        policy
            .authorized_users
            .iter()
            .find(|user| user.account == identity)
            .map(|user| user.tier)
            .or(policy.everyone)
            .unwrap_or(PermissionTier::None)
    }
}
