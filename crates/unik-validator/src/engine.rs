//! The admission decision
//!
//! For every applicable scope the validator lists the Services in that scope and
//! denies the candidate as soon as another Service holds the same value for one
//! of the protected keys. The candidate itself is never compared against its own
//! stored state, so updating a Service never conflicts with its previous version.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use unik_common::DEFAULT_LIST_TIMEOUT_SECS;

use crate::error::ValidationError;
use crate::lister::ServiceLister;
use crate::object::{is_supported_resource, AnnotatedService, Candidate};
use crate::registry::ScopeRegistry;
use crate::resolver::{ScopeCheck, ScopeResolver};

/// Warning attached when the request is not for a supported resource
pub const UNSUPPORTED_RESOURCE_WARNING: &str = "request does not contain a supported resource";

/// Warning attached when a key is protected both cluster-wide and in a namespace
pub const CROSS_SCOPE_CONFLICT_WARNING: &str =
    "configuration has annotations protected in cluster scope and in namespace scope";

/// Reason for admitting a request for an unsupported resource
pub const REASON_UNSUPPORTED_RESOURCE: &str = "unsupported resource";

/// Reason for admitting a Service that carries no protected annotation
pub const REASON_NO_PROTECTED_ANNOTATIONS: &str = "no protected annotations";

/// Reason for admitting a Service whose protected values are all unique
pub const REASON_NO_DUPLICATE_ANNOTATIONS: &str = "no duplicate annotations";

/// Outcome of a validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the object may be admitted
    pub allowed: bool,
    /// Human-readable explanation; on deny it names the conflicting object
    pub reason: String,
    /// Warnings returned to the client regardless of the outcome
    pub warnings: Vec<String>,
}

impl Decision {
    /// Admit with the given reason
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            warnings: Vec::new(),
        }
    }

    /// Reject with the given reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            warnings: Vec::new(),
        }
    }

    /// Attach warnings
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Decides whether candidates may be admitted
#[derive(Debug, Clone)]
pub struct Validator {
    resolver: ScopeResolver,
    list_timeout: Duration,
}

impl Validator {
    /// Create a validator over a shared registry
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self {
            resolver: ScopeResolver::new(registry),
            list_timeout: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
        }
    }

    /// Deadline applied to each lister call
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// The resolver used to select scopes
    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Decide whether `candidate` may be admitted.
    ///
    /// Unsupported resources are always admitted. Candidates without protected
    /// annotations are admitted without calling `lister`. Otherwise every
    /// applicable scope is listed and the first duplicate value found denies the
    /// request.
    ///
    /// A lister failure, a lister call exceeding the deadline, or `cancel`
    /// firing yields an error, never an allow.
    pub async fn validate(
        &self,
        candidate: &Candidate,
        lister: &dyn ServiceLister,
        cancel: &CancellationToken,
    ) -> Result<Decision, ValidationError> {
        if !is_supported_resource(&candidate.resource) {
            return Ok(Decision::allow(REASON_UNSUPPORTED_RESOURCE)
                .with_warnings(vec![UNSUPPORTED_RESOURCE_WARNING.to_string()]));
        }

        let mut warnings = Vec::new();
        if self.resolver.has_cross_scope_conflict() {
            warnings.push(CROSS_SCOPE_CONFLICT_WARNING.to_string());
        }

        let service = &candidate.service;
        let checks = self.resolver.resolve(
            &service.namespace,
            service.annotations.keys().map(String::as_str),
        );
        if checks.is_empty() {
            return Ok(Decision::allow(REASON_NO_PROTECTED_ANNOTATIONS).with_warnings(warnings));
        }

        for check in &checks {
            let existing = self.list_scope(service, check, lister, cancel).await?;
            if let Some((other, key, value)) = find_duplicate(service, &existing, check) {
                return Ok(Decision::deny(duplicate_reason(other, key, value))
                    .with_warnings(warnings));
            }
        }

        Ok(Decision::allow(REASON_NO_DUPLICATE_ANNOTATIONS).with_warnings(warnings))
    }

    /// List the Services in one scope, bounded by the deadline and `cancel`
    async fn list_scope(
        &self,
        service: &AnnotatedService,
        check: &ScopeCheck,
        lister: &dyn ServiceLister,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnnotatedService>, ValidationError> {
        let cancelled = || ValidationError::Cancelled {
            scope: check.scope.clone(),
            namespace: service.namespace.clone(),
            name: service.name.clone(),
            keys: check.keys.clone(),
        };

        // select! builds every branch future up front, so don't even start the
        // list call for a request that is already gone
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let selector = check.scope.selector();
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            listed = tokio::time::timeout(self.list_timeout, lister.list(&selector)) => listed,
        };

        match listed {
            Ok(Ok(existing)) => Ok(existing),
            Ok(Err(source)) => Err(ValidationError::List {
                scope: check.scope.clone(),
                namespace: service.namespace.clone(),
                name: service.name.clone(),
                keys: check.keys.clone(),
                source,
            }),
            Err(_) => Err(ValidationError::ListTimeout {
                scope: check.scope.clone(),
                namespace: service.namespace.clone(),
                name: service.name.clone(),
                keys: check.keys.clone(),
                timeout: self.list_timeout,
            }),
        }
    }
}

/// First other Service holding the candidate's value for a key of `check`
fn find_duplicate<'a>(
    candidate: &'a AnnotatedService,
    existing: &'a [AnnotatedService],
    check: &'a ScopeCheck,
) -> Option<(&'a AnnotatedService, &'a str, &'a str)> {
    existing
        .iter()
        .filter(|other| !other.is_same_object(candidate))
        .find_map(|other| {
            check.keys.iter().find_map(|key| {
                let value = candidate.annotations.get(key)?;
                (other.annotations.get(key) == Some(value))
                    .then_some((other, key.as_str(), value.as_str()))
            })
        })
}

fn duplicate_reason(other: &AnnotatedService, key: &str, value: &str) -> String {
    format!(
        "{}/{} already has the same value for annotation {}: {}",
        other.namespace, other.name, key, value
    )
}
