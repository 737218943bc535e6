//! Objects compared by the validator

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;

/// Group/version/resource of an admission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// API group, empty for the core group
    pub group: String,
    /// API version
    pub version: String,
    /// Plural resource name
    pub resource: String,
}

impl ResourceRef {
    /// Create a resource reference
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Core `v1` `services`, the only supported resource
    pub fn services() -> Self {
        Self::new("", "v1", "services")
    }
}

/// Whether the validator understands objects of this resource type
pub fn is_supported_resource(resource: &ResourceRef) -> bool {
    resource.group.is_empty() && resource.version == "v1" && resource.resource == "services"
}

/// The identity and annotations of a Service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedService {
    /// Namespace of the Service
    pub namespace: String,
    /// Name of the Service
    pub name: String,
    /// Annotations, key → value
    pub annotations: BTreeMap<String, String>,
}

impl AnnotatedService {
    /// Create a Service with no annotations
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Whether `other` is the same object (same namespace and name)
    pub fn is_same_object(&self, other: &AnnotatedService) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl From<&Service> for AnnotatedService {
    fn from(service: &Service) -> Self {
        Self {
            namespace: service.metadata.namespace.clone().unwrap_or_default(),
            name: service.metadata.name.clone().unwrap_or_default(),
            annotations: service.metadata.annotations.clone().unwrap_or_default(),
        }
    }
}

/// An object being admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Resource type the admission request was made for
    pub resource: ResourceRef,
    /// The object as it would be stored
    pub service: AnnotatedService,
}

impl Candidate {
    /// Candidate for the supported Service resource
    pub fn service(service: AnnotatedService) -> Self {
        Self {
            resource: ResourceRef::services(),
            service,
        }
    }
}
