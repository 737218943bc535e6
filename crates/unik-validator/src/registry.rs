//! Registry of protected annotation keys per scope
//!
//! The registry is shared by every in-flight validation. Reads take a shared
//! lock and never block each other; a mutation holds the exclusive lock for the
//! whole update, so readers see the registry either entirely before or entirely
//! after it.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::{RwLock, RwLockReadGuard};
use unik_common::config::RegistryConfig;

use crate::scope::Scope;

pub(crate) type ScopeMap = BTreeMap<Scope, BTreeSet<String>>;

/// Protected annotation keys, keyed by scope
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: RwLock<ScopeMap>,
}

impl ScopeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the static startup configuration
    pub fn from_config(config: &RegistryConfig) -> Self {
        let registry = Self::new();
        for (scope, keys) in &config.annotations {
            registry.register(Scope::from_config_name(scope), keys.iter().cloned());
        }
        registry
    }

    /// Protect `keys` in `scope`.
    ///
    /// Registering a key twice is a no-op. Registering an empty key set still
    /// registers the scope. The whole call is applied under one write lock.
    pub fn register<I, K>(&self, scope: Scope, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.scopes.write().entry(scope).or_default().extend(keys);
    }

    /// Whether `scope` has been registered, even with no keys
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scopes.read().contains_key(scope)
    }

    /// Whether `key` is protected in `scope`. Unknown scopes protect nothing.
    pub fn is_protected(&self, scope: &Scope, key: &str) -> bool {
        self.scopes
            .read()
            .get(scope)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Keys protected in `scope`, empty for unknown scopes
    pub fn keys_protected_in_scope(&self, scope: &Scope) -> BTreeSet<String> {
        self.scopes.read().get(scope).cloned().unwrap_or_default()
    }

    /// Snapshot of all registered scopes
    pub fn all_scopes(&self) -> BTreeSet<Scope> {
        self.scopes.read().keys().cloned().collect()
    }

    /// Whether some key is protected both cluster-wide and in a namespace.
    ///
    /// Such a configuration has no well-defined precedence. It is reported as a
    /// warning and never blocks evaluation.
    pub fn has_cross_scope_conflict(&self) -> bool {
        let scopes = self.scopes.read();
        let Some(cluster_keys) = scopes.get(&Scope::Cluster) else {
            return false;
        };

        scopes
            .iter()
            .filter(|(scope, _)| !scope.is_cluster())
            .any(|(_, keys)| !keys.is_disjoint(cluster_keys))
    }

    /// Hold the read lock for a multi-step lookup that must see one state
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ScopeMap> {
        self.scopes.read()
    }
}
