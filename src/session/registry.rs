/*!
 * Session Registry
 *
 * Three indices over committed sessions:
 * - by URI: at most one session per original file
 * - by sandbox key: every session opened into an instance, in commit order
 * - by tier: instance reused for gathering, only populated under gathering
 *
 * Invariants: every session reachable by URI is reachable from its key's
 * list; every tier entry names a key that has sessions.
 */

use super::types::{CommitOutcome, RegistryStats, Session, SessionSummary};
use crate::core::types::SandboxKey;
use crate::permissions::{GatheringPolicy, PermissionTier};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session indices; not synchronized on its own, see [`SharedRegistry`]
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_uri: HashMap<String, Arc<Session>, RandomState>,
    by_sandbox: HashMap<SandboxKey, Vec<Arc<Session>>, RandomState>,
    by_tier: HashMap<PermissionTier, SandboxKey, RandomState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_by_uri(&self, uri: &str) -> Option<Arc<Session>> {
        self.by_uri.get(uri).cloned()
    }

    /// Instance to route a different file at the same tier into
    ///
    /// Only under gathering, and only when the instance belongs to `bundle`.
    pub fn lookup_for_gathering(
        &self,
        tier: PermissionTier,
        gathering: GatheringPolicy,
        bundle: &str,
    ) -> Option<SandboxKey> {
        if !gathering.is_gathering() {
            return None;
        }
        self.by_tier
            .get(&tier)
            .filter(|key| key.bundle_name == bundle)
            .cloned()
    }

    /// Find the session owning a link file
    pub fn find_by_link_name(&self, link_name: &str) -> Option<Arc<Session>> {
        self.by_sandbox
            .values()
            .flat_map(|sessions| sessions.iter())
            .find(|session| session.link_name() == link_name)
            .cloned()
    }

    pub fn sessions_for(&self, key: &SandboxKey) -> Vec<Arc<Session>> {
        self.by_sandbox.get(key).cloned().unwrap_or_default()
    }

    /// Insert a launched session into every index
    pub fn commit(&mut self, session: Arc<Session>, gathering: GatheringPolicy) -> CommitOutcome {
        let outcome = match self.by_uri.get(&session.uri) {
            Some(existing) if Arc::ptr_eq(existing, &session) => CommitOutcome::Refreshed,
            Some(existing) => {
                warn!(
                    uri = %session.uri,
                    previous_link = %existing.link_name(),
                    link_name = %session.link_name(),
                    "session committed twice for one URI, overwriting"
                );
                CommitOutcome::Replaced(existing.clone())
            }
            None => CommitOutcome::Inserted,
        };

        let sessions = self.by_sandbox.entry(session.key.clone()).or_default();
        if !sessions.iter().any(|s| Arc::ptr_eq(s, &session)) {
            sessions.push(session.clone());
        }
        if gathering.is_gathering() {
            self.by_tier.insert(session.tier, session.key.clone());
        }
        debug!(
            uri = %session.uri,
            link_name = %session.link_name(),
            sandbox = %session.key,
            tier = %session.tier,
            "session committed"
        );
        self.by_uri.insert(session.uri.clone(), session);
        outcome
    }

    /// Remove one session by its instance and link name
    ///
    /// Drops the URI entry when it points at this session and the tier
    /// entries of the instance once it has no sessions left.
    pub fn remove_by_sandbox_key_and_link_name(
        &mut self,
        key: &SandboxKey,
        link_name: &str,
    ) -> Option<Arc<Session>> {
        let sessions = self.by_sandbox.get_mut(key)?;
        let position = sessions.iter().position(|s| s.link_name() == link_name)?;
        let removed = sessions.remove(position);
        if sessions.is_empty() {
            self.by_sandbox.remove(key);
            self.by_tier.retain(|_, k| k != key);
        }

        if self
            .by_uri
            .get(&removed.uri)
            .is_some_and(|s| Arc::ptr_eq(s, &removed))
        {
            self.by_uri.remove(&removed.uri);
        }
        Some(removed)
    }

    /// Remove every session of an instance
    pub fn remove_sandbox(&mut self, key: &SandboxKey) -> Vec<Arc<Session>> {
        let removed = self.by_sandbox.remove(key).unwrap_or_default();
        self.by_tier.retain(|_, k| k != key);
        self.by_uri
            .retain(|_, session| !removed.iter().any(|r| Arc::ptr_eq(r, session)));
        removed
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            uris: self.by_uri.len(),
            sandboxes: self.by_sandbox.len(),
            sessions: self.by_sandbox.values().map(Vec::len).sum(),
            gathering_tiers: self.by_tier.len(),
        }
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .by_sandbox
            .values()
            .flat_map(|sessions| sessions.iter().map(|s| s.summary()))
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.link_name.cmp(&b.link_name)));
        summaries
    }

    /// Check the cross-index invariants
    pub fn is_consistent(&self) -> bool {
        let uris_indexed = self.by_uri.values().all(|session| {
            self.by_sandbox
                .get(&session.key)
                .is_some_and(|list| list.iter().any(|s| Arc::ptr_eq(s, session)))
        });
        let tiers_indexed = self
            .by_tier
            .values()
            .all(|key| self.by_sandbox.get(key).is_some_and(|list| !list.is_empty()));
        uris_indexed && tiers_indexed
    }
}

/// Process-wide registry owner
///
/// Every operation takes the lock exactly once, so callers never observe a
/// partially indexed session.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<SessionRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_by_uri(&self, uri: &str) -> Option<Arc<Session>> {
        self.inner.read().lookup_by_uri(uri)
    }

    pub fn lookup_for_gathering(
        &self,
        tier: PermissionTier,
        gathering: GatheringPolicy,
        bundle: &str,
    ) -> Option<SandboxKey> {
        self.inner.read().lookup_for_gathering(tier, gathering, bundle)
    }

    pub fn find_by_link_name(&self, link_name: &str) -> Option<Arc<Session>> {
        self.inner.read().find_by_link_name(link_name)
    }

    pub fn sessions_for(&self, key: &SandboxKey) -> Vec<Arc<Session>> {
        self.inner.read().sessions_for(key)
    }

    pub fn commit(&self, session: Arc<Session>, gathering: GatheringPolicy) -> CommitOutcome {
        self.inner.write().commit(session, gathering)
    }

    pub fn remove_by_sandbox_key_and_link_name(
        &self,
        key: &SandboxKey,
        link_name: &str,
    ) -> Option<Arc<Session>> {
        self.inner
            .write()
            .remove_by_sandbox_key_and_link_name(key, link_name)
    }

    pub fn remove_sandbox(&self, key: &SandboxKey) -> Vec<Arc<Session>> {
        self.inner.write().remove_sandbox(key)
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.read().stats()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.inner.read().summaries()
    }

    pub fn is_consistent(&self) -> bool {
        self.inner.read().is_consistent()
    }
}
