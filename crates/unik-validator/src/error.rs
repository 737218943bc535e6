//! Validation failures
//!
//! A failure means no decision could be computed. Callers must not treat it as
//! an allow.

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

use crate::lister::ListError;
use crate::scope::Scope;

/// Why a validation could not produce a decision
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The lister failed for one of the applicable scopes
    #[error(
        "failed to list services in scope {scope} while validating {namespace}/{name} (annotations {}): {source}",
        join_keys(.keys)
    )]
    List {
        /// Scope being checked
        scope: Scope,
        /// Candidate namespace
        namespace: String,
        /// Candidate name
        name: String,
        /// Protected keys that were being checked in `scope`
        keys: BTreeSet<String>,
        /// The lister's error
        #[source]
        source: ListError,
    },

    /// The lister did not answer before the deadline
    #[error(
        "listing services in scope {scope} for {namespace}/{name} (annotations {}) timed out after {timeout:?}",
        join_keys(.keys)
    )]
    ListTimeout {
        /// Scope being checked
        scope: Scope,
        /// Candidate namespace
        namespace: String,
        /// Candidate name
        name: String,
        /// Protected keys that were being checked in `scope`
        keys: BTreeSet<String>,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The enclosing request was cancelled
    #[error(
        "validation of {namespace}/{name} (annotations {}) cancelled while checking scope {scope}",
        join_keys(.keys)
    )]
    Cancelled {
        /// Scope being checked
        scope: Scope,
        /// Candidate namespace
        namespace: String,
        /// Candidate name
        name: String,
        /// Protected keys that were being checked in `scope`
        keys: BTreeSet<String>,
    },
}

impl ValidationError {
    /// Scope that was being checked when validation failed
    pub fn scope(&self) -> &Scope {
        match self {
            Self::List { scope, .. }
            | Self::ListTimeout { scope, .. }
            | Self::Cancelled { scope, .. } => scope,
        }
    }

    /// Protected annotation keys that were being checked when validation failed
    pub fn keys(&self) -> &BTreeSet<String> {
        match self {
            Self::List { keys, .. } | Self::ListTimeout { keys, .. } | Self::Cancelled { keys, .. } => {
                keys
            }
        }
    }

    /// Short machine-readable failure kind, for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::ListTimeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

fn join_keys(keys: &BTreeSet<String>) -> String {
    keys.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_list_error_names_scope_object_and_keys() {
        let err = ValidationError::List {
            scope: Scope::Cluster,
            namespace: "default".to_string(),
            name: "svc-a".to_string(),
            keys: keys(&["ncp/snat_pool"]),
            source: ListError::Unavailable("connection refused".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "failed to list services in scope * while validating default/svc-a \
             (annotations ncp/snat_pool): service lister unavailable: connection refused"
        );
        assert_eq!(err.scope(), &Scope::Cluster);
        assert_eq!(err.kind(), "list");
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error as _;

        let err = ValidationError::List {
            scope: Scope::namespace("ns1"),
            namespace: "ns1".to_string(),
            name: "svc".to_string(),
            keys: keys(&["k"]),
            source: ListError::Unavailable("boom".to_string()),
        };

        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "service lister unavailable: boom");
    }

    #[test]
    fn test_timeout_reports_deadline() {
        let err = ValidationError::ListTimeout {
            scope: Scope::namespace("ns1"),
            namespace: "ns1".to_string(),
            name: "svc".to_string(),
            keys: keys(&["b", "a"]),
            timeout: Duration::from_secs(10),
        };

        let msg = err.to_string();
        assert!(msg.contains("10s"));
        assert!(msg.contains("(annotations a, b)"));
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_cancelled_carries_keys() {
        let err = ValidationError::Cancelled {
            scope: Scope::Cluster,
            namespace: "default".to_string(),
            name: "svc-a".to_string(),
            keys: keys(&["ncp/snat_pool"]),
        };

        assert_eq!(err.keys(), &keys(&["ncp/snat_pool"]));
        assert!(err.to_string().contains("ncp/snat_pool"));
    }
}
