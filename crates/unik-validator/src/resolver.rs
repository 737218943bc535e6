//! Scope resolution for a candidate Service
//!
//! A Service is checked in at most two scopes: its own namespace and the
//! cluster scope. Only protected keys the Service actually carries are checked.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::registry::ScopeRegistry;
use crate::scope::Scope;

/// One scope to check and the candidate's keys protected in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeCheck {
    /// Scope whose Services must be compared against the candidate
    pub scope: Scope,
    /// Candidate annotation keys protected in `scope`, never empty
    pub keys: BTreeSet<String>,
}

/// Computes the scopes and keys that apply to a candidate
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    registry: Arc<ScopeRegistry>,
}

impl ScopeResolver {
    /// Create a resolver over a shared registry
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this resolver reads
    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Scopes to check for a Service in `namespace` carrying `annotation_keys`.
    ///
    /// The namespace scope comes first, then the cluster scope. Scopes that are
    /// not registered, or in which none of the candidate's keys are protected,
    /// are left out. An empty result means there is nothing to check.
    ///
    /// The registry is read under a single lock, so the result reflects one
    /// consistent registry state.
    pub fn resolve<'a, I>(&self, namespace: &str, annotation_keys: I) -> Vec<ScopeCheck>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidate_keys: BTreeSet<&str> = annotation_keys.into_iter().collect();
        if candidate_keys.is_empty() {
            return Vec::new();
        }

        let mut candidate_scopes = Vec::with_capacity(2);
        if !namespace.is_empty() {
            candidate_scopes.push(Scope::namespace(namespace));
        }
        candidate_scopes.push(Scope::Cluster);

        let scopes = self.registry.read();
        candidate_scopes
            .into_iter()
            .filter_map(|scope| {
                let protected = scopes.get(&scope)?;
                let keys: BTreeSet<String> = candidate_keys
                    .iter()
                    .filter(|key| protected.contains(**key))
                    .map(|key| key.to_string())
                    .collect();
                (!keys.is_empty()).then_some(ScopeCheck { scope, keys })
            })
            .collect()
    }

    /// Whether the registry protects a key both cluster-wide and in a namespace
    pub fn has_cross_scope_conflict(&self) -> bool {
        self.registry.has_cross_scope_conflict()
    }
}
