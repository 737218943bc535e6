//! Service validation webhook
//!
//! Handles AdmissionReview requests for Services, rejecting any Service that
//! would share a protected annotation value with another Service in the same
//! scope.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    Extension, Json,
};
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use opentelemetry::KeyValue;
use tracing::{debug, error, info, warn, Instrument};
use unik_common::metrics::{DecisionLabel, ADMISSION_DECISIONS};
use unik_validator::{is_supported_resource, AnnotatedService, Candidate, Decision, ResourceRef};

use crate::error::WebhookError;
use crate::request_id::RequestId;
use crate::WebhookState;

/// Reason given when the request carries no object, as for DELETE
pub const REASON_NO_OBJECT: &str = "no object to validate";

/// Handle validating admission review for Services
///
/// A body that is not JSON, or not an AdmissionReview, is rejected with 400. A
/// review without a request gets an `invalid` response. Every other review gets
/// a decision; failures to decide deny the request.
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    if !is_json(&headers) {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("<none>");
        warn!(request_id = %request_id, content_type, "Rejecting non-JSON admission request");
        return Err(WebhookError::InvalidReview(format!(
            "wrong content type {content_type}, expected application/json"
        )));
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(&body).map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Request body is not an AdmissionReview");
        WebhookError::InvalidReview(e.to_string())
    })?;

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to parse admission request");
            record_decision(DecisionLabel::Error);
            return Ok(Json(AdmissionResponse::invalid(e.to_string()).into_review()));
        }
    };

    let span = tracing::info_span!(
        "admission",
        uid = %request.uid,
        operation = ?request.operation,
        namespace = request.namespace.as_deref().unwrap_or_default(),
        name = %request.name,
    );
    let response = review_service(&state, &request).instrument(span).await;
    Ok(Json(response.into_review()))
}

/// Decide a single admission request
async fn review_service(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    match admit(state, request).await {
        Ok(decision) => {
            if decision.allowed {
                info!(reason = %decision.reason, "Allowing Service");
                record_decision(DecisionLabel::Allowed);
            } else {
                warn!(reason = %decision.reason, "Denying Service with duplicate annotation");
                record_decision(DecisionLabel::Denied);
            }
            decision_response(request, decision)
        }
        // fail closed: no decision means no admission
        Err(WebhookError::Validation(e)) => {
            error!(
                error = %e,
                kind = e.kind(),
                scope = %e.scope(),
                keys = ?e.keys(),
                "Failed to validate Service, denying"
            );
            record_decision(DecisionLabel::Error);
            AdmissionResponse::from(request).deny(e.to_string())
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Failed to validate Service, denying");
            record_decision(DecisionLabel::Error);
            AdmissionResponse::from(request).deny(e.to_string())
        }
    }
}

async fn admit(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<Decision, WebhookError> {
    let Some(candidate) = candidate(request)? else {
        debug!("No object in request, allowing");
        return Ok(Decision::allow(REASON_NO_OBJECT));
    };

    let decision = state
        .validator
        .validate(&candidate, state.lister.as_ref(), &state.abort)
        .await?;
    Ok(decision)
}

/// Build the candidate for an admission request.
///
/// Returns `None` when a supported request carries no object. Objects of
/// unsupported resources are not decoded; the validator admits them.
pub fn candidate(
    request: &AdmissionRequest<DynamicObject>,
) -> Result<Option<Candidate>, WebhookError> {
    let resource = ResourceRef::new(
        &request.resource.group,
        &request.resource.version,
        &request.resource.resource,
    );
    let request_namespace = request.namespace.clone().unwrap_or_default();

    // the validator warns about these; their objects are never Services
    if !is_supported_resource(&resource) {
        return Ok(Some(Candidate {
            resource,
            service: AnnotatedService::new(request_namespace, &request.name),
        }));
    }

    let Some(object) = &request.object else {
        return Ok(None);
    };

    let decoded: Service = serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| WebhookError::Decode {
            namespace: request_namespace.clone(),
            name: request.name.clone(),
            source,
        })?;

    // CREATE objects may omit both; the request always carries them
    let mut service = AnnotatedService::from(&decoded);
    if service.namespace.is_empty() {
        service.namespace = request_namespace;
    }
    if service.name.is_empty() {
        service.name = request.name.clone();
    }

    Ok(Some(Candidate { resource, service }))
}

/// Encode a decision as an admission response
pub fn decision_response(
    request: &AdmissionRequest<DynamicObject>,
    decision: Decision,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    if !decision.warnings.is_empty() {
        response.warnings = Some(decision.warnings);
    }

    if decision.allowed {
        response
    } else {
        response.deny(decision.reason)
    }
}

/// Whether the request declares a JSON body. Media type parameters such as
/// `charset` are ignored.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

fn record_decision(label: DecisionLabel) {
    ADMISSION_DECISIONS.add(1, &[KeyValue::new("decision", label.as_str())]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn request(resource: serde_json::Value, object: serde_json::Value) -> AdmissionRequest<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "", "version": "v1", "kind": "Service"},
                "resource": resource,
                "requestKind": {"group": "", "version": "v1", "kind": "Service"},
                "requestResource": resource,
                "name": "svc-a",
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {"username": "admin"},
                "object": object,
                "oldObject": null,
                "dryRun": false,
                "options": null
            }
        }))
        .unwrap();
        review.try_into().unwrap()
    }

    fn services() -> serde_json::Value {
        json!({"group": "", "version": "v1", "resource": "services"})
    }

    #[test]
    fn test_candidate_from_service_object() {
        let req = request(
            services(),
            json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": {
                    "name": "svc-a",
                    "namespace": "default",
                    "annotations": {"ncp/snat_pool": "pool-1"}
                },
                "spec": {"ports": [{"port": 80}]}
            }),
        );

        let candidate = candidate(&req).unwrap().unwrap();

        assert_eq!(candidate.resource, ResourceRef::services());
        assert_eq!(
            candidate.service,
            AnnotatedService::new("default", "svc-a").with_annotation("ncp/snat_pool", "pool-1")
        );
    }

    #[test]
    fn test_candidate_falls_back_to_request_identity() {
        let req = request(
            services(),
            json!({"apiVersion": "v1", "kind": "Service", "metadata": {}}),
        );

        let candidate = candidate(&req).unwrap().unwrap();

        assert_eq!(candidate.service.namespace, "default");
        assert_eq!(candidate.service.name, "svc-a");
    }

    #[test]
    fn missing_object_has_no_candidate() {
        let req = request(services(), serde_json::Value::Null);
        assert!(candidate(&req).unwrap().is_none());
    }

    #[test]
    fn test_malformed_service_fails_to_decode() {
        let req = request(
            services(),
            json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": {"name": "svc-a"},
                "spec": {"ports": "eighty"}
            }),
        );

        let err = candidate(&req).unwrap_err();
        assert!(matches!(err, WebhookError::Decode { .. }));
    }

    #[test]
    fn test_unsupported_resource_is_not_decoded() {
        let req = request(
            json!({"group": "apps", "version": "v1", "resource": "deployments"}),
            json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "d"}, "spec": 1}),
        );

        let candidate = candidate(&req).unwrap().unwrap();

        assert!(!is_supported_resource(&candidate.resource));
        assert!(candidate.service.annotations.is_empty());
    }

    #[test]
    fn denial_carries_reason_and_warnings() {
        let req = request(services(), serde_json::Value::Null);
        let decision = Decision::deny("other/svc-b already has the same value")
            .with_warnings(vec!["careful".to_string()]);

        let response = decision_response(&req, decision);

        assert!(!response.allowed);
        assert_eq!(response.result.message, "other/svc-b already has the same value");
        assert_eq!(response.warnings, Some(vec!["careful".to_string()]));
        assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
    }

    #[rstest]
    #[case::plain("application/json", true)]
    #[case::charset("application/json; charset=utf-8", true)]
    #[case::upper_case("Application/JSON", true)]
    #[case::yaml("application/yaml", false)]
    #[case::text("text/plain", false)]
    fn test_content_type_must_be_json(#[case] content_type: &str, #[case] expected: bool) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        assert_eq!(is_json(&headers), expected);
    }

    #[test]
    fn test_missing_content_type_is_not_json() {
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn test_allow_without_warnings_omits_them() {
        let req = request(services(), serde_json::Value::Null);

        let response = decision_response(&req, Decision::allow("no protected annotations"));

        assert!(response.allowed);
        assert!(response.warnings.is_none());
    }
}
