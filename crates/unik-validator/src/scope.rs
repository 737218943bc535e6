//! Uniqueness scopes and list selectors

use std::fmt;

use unik_common::CLUSTER_SCOPE_NAME;

/// Where an annotation value must be unique
///
/// `Cluster` is a sentinel distinct from every namespace: it is not represented
/// as a string, so no namespace name can collide with it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Unique across all namespaces
    Cluster,
    /// Unique within one namespace
    Namespace(String),
}

impl Scope {
    /// Namespace scope for the given namespace name
    pub fn namespace(name: impl Into<String>) -> Self {
        Self::Namespace(name.into())
    }

    /// Map a configuration scope name to a scope; `"*"` is the cluster scope
    pub fn from_config_name(name: &str) -> Self {
        if name == CLUSTER_SCOPE_NAME {
            Self::Cluster
        } else {
            Self::Namespace(name.to_string())
        }
    }

    /// Whether this is the cluster-wide scope
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster)
    }

    /// Selector for listing the Services that share this scope
    pub fn selector(&self) -> ScopeSelector {
        match self {
            Self::Cluster => ScopeSelector::AllNamespaces,
            Self::Namespace(ns) => ScopeSelector::Namespace(ns.clone()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => f.write_str(CLUSTER_SCOPE_NAME),
            Self::Namespace(ns) => f.write_str(ns),
        }
    }
}

/// Which Services a lister call should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelector {
    /// Services in every namespace
    AllNamespaces,
    /// Services in a single namespace
    Namespace(String),
}

impl ScopeSelector {
    /// The concrete namespace, or `None` for all namespaces
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::AllNamespaces => None,
            Self::Namespace(ns) => Some(ns),
        }
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllNamespaces => f.write_str("<all namespaces>"),
            Self::Namespace(ns) => f.write_str(ns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_config_name_is_cluster() {
        assert_eq!(Scope::from_config_name("*"), Scope::Cluster);
        assert_eq!(
            Scope::from_config_name("default"),
            Scope::namespace("default")
        );
    }

    #[test]
    fn test_cluster_selects_all_namespaces() {
        assert_eq!(Scope::Cluster.selector(), ScopeSelector::AllNamespaces);
        assert_eq!(Scope::Cluster.selector().namespace(), None);
    }

    #[test]
    fn namespace_selects_itself() {
        let selector = Scope::namespace("team-a").selector();
        assert_eq!(selector.namespace(), Some("team-a"));
    }

    #[test]
    fn test_display_round_trips_config_names() {
        assert_eq!(Scope::Cluster.to_string(), "*");
        assert_eq!(Scope::namespace("ns1").to_string(), "ns1");
    }

    #[test]
    fn test_namespace_scopes_sort_after_cluster() {
        let mut scopes = vec![Scope::namespace("a"), Scope::Cluster];
        scopes.sort();
        assert_eq!(scopes[0], Scope::Cluster);
    }
}
