//! Scoped annotation uniqueness validation
//!
//! Decides whether a Service may be admitted given the Services that already
//! exist in the cluster. Some annotation keys are *protected*: their values must
//! be unique either cluster-wide or within a namespace.
//!
//! # Components
//!
//! - [`registry`] - which annotation keys are protected in which [`Scope`]
//! - [`resolver`] - which scopes and keys apply to a given candidate
//! - [`engine`] - the allow/deny decision, querying a [`ServiceLister`]
//!
//! The crate performs no logging. Every failure is returned as a
//! [`ValidationError`] carrying the scope and object identity so the caller can
//! log it and build a diagnostic admission response.

#![deny(missing_docs)]

pub mod engine;
pub mod error;
pub mod lister;
pub mod object;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use engine::{Decision, Validator};
pub use error::ValidationError;
pub use lister::{ListError, ServiceLister};
pub use object::{is_supported_resource, AnnotatedService, Candidate, ResourceRef};
pub use registry::ScopeRegistry;
pub use resolver::{ScopeCheck, ScopeResolver};
pub use scope::{Scope, ScopeSelector};
