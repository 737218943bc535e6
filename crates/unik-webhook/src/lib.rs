//! Validating admission webhook for Service annotation uniqueness
//!
//! Receives `AdmissionReview` requests from the API server, decodes the Service
//! under admission, asks the [`unik_validator::Validator`] for a decision and
//! encodes it back into an `AdmissionReview` response.
//!
//! # Endpoints
//!
//! - `POST /validate` - validating admission endpoint
//! - `GET /healthz` - liveness probe

#![deny(missing_docs)]

pub mod admission;
pub mod error;
pub mod lister;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio_util::sync::CancellationToken;
use unik_validator::{ServiceLister, Validator};

pub use error::WebhookError;
pub use lister::KubeServiceLister;
pub use server::{run_server, ServerConfig, TlsConfig};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Decision engine backed by the shared scope registry
    pub validator: Validator,
    /// Source of the Services already in the cluster
    pub lister: Arc<dyn ServiceLister>,
    /// Aborts in-flight list calls; cancelled once the shutdown drain window is over
    pub abort: CancellationToken,
}

impl WebhookState {
    /// Create webhook state
    pub fn new(
        validator: Validator,
        lister: Arc<dyn ServiceLister>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            validator,
            lister,
            abort,
        }
    }
}

/// Create the webhook router
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(admission::validate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(middleware::from_fn(request_id::propagate_request_id))
        .with_state(state)
}
