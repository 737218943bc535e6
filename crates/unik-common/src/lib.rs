//! Common types for unik: configuration, errors, telemetry and utilities

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default listen address for the admission webhook
pub const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:9090";

/// Default path of the TLS certificate mounted into the webhook pod
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/certs/tls.crt";

/// Default path of the TLS private key mounted into the webhook pod
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/certs/tls.key";

/// Default deadline for a single Service list call, in seconds
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 10;

/// Scope name used in configuration for the cluster-wide scope
pub const CLUSTER_SCOPE_NAME: &str = "*";

/// NSX-T NCP SNAT pool annotation, protected cluster-wide when no config is given
pub const ANNOTATION_NCP_SNAT_POOL: &str = "ncp/snat_pool";
