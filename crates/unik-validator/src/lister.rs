//! Capability to enumerate existing Services

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::object::AnnotatedService;
use crate::scope::ScopeSelector;

/// Why a list call failed
#[derive(Debug, Error)]
pub enum ListError {
    /// The Kubernetes API returned an error or was unreachable
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Any other lister failure
    #[error("service lister unavailable: {0}")]
    Unavailable(String),
}

/// Lists the Services currently visible in a scope.
///
/// Implementations must return every Service in the selected scope. Paging,
/// caching and retries are the implementation's concern; the validator calls
/// `list` once per scope and never retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceLister: Send + Sync {
    /// List Services matching `selector`
    async fn list(&self, selector: &ScopeSelector) -> Result<Vec<AnnotatedService>, ListError>;
}
