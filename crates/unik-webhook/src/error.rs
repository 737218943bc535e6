//! Webhook error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use unik_validator::ValidationError;

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The request body is not an AdmissionReview
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// The admitted object could not be decoded as a Service
    #[error("failed to decode Service {namespace}/{name}: {source}")]
    Decode {
        /// Namespace from the admission request
        namespace: String,
        /// Name from the admission request
        name: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// The validator could not reach a decision
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Certificate or key could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// The HTTP server failed
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl WebhookError {
    /// Short machine-readable error kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReview(_) => "invalid_review",
            Self::Decode { .. } => "decode",
            Self::Validation(e) => e.kind(),
            Self::Tls(_) => "tls",
            Self::Server(_) => "server",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_) | WebhookError::Decode { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({
                "kind": "Status",
                "apiVersion": "v1",
                "status": "Failure",
                "message": self.to_string(),
                "reason": status.canonical_reason().unwrap_or_default(),
                "code": status.as_u16(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unik_validator::Scope;

    #[test]
    fn test_invalid_review_is_bad_request() {
        let response = WebhookError::InvalidReview("expected value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_error_is_internal() {
        let err = WebhookError::from(std::io::Error::other("bind failed"));
        assert_eq!(err.kind(), "server");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_error_keeps_its_message() {
        let err = WebhookError::from(ValidationError::Cancelled {
            scope: Scope::Cluster,
            namespace: "default".to_string(),
            name: "svc-a".to_string(),
            keys: ["ncp/snat_pool".to_string()].into(),
        });

        assert_eq!(err.kind(), "cancelled");
        assert!(err.to_string().contains("default/svc-a"));
    }

    #[test]
    fn test_decode_error_names_object() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = WebhookError::Decode {
            namespace: "ns1".to_string(),
            name: "svc".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("failed to decode Service ns1/svc"));
    }
}
