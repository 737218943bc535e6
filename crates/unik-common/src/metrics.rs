//! Metrics for the admission webhook
//!
//! Instruments are registered against the global meter provider, which exports
//! over OTLP once telemetry is initialized and is a no-op otherwise.

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};

static METER: Lazy<Meter> = Lazy::new(|| global::meter("unik"));

/// Counter of admission decisions
///
/// Labels:
/// - `decision`: allowed, denied, error
pub static ADMISSION_DECISIONS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("unik_admission_decisions_total")
        .with_description("Total number of admission decisions")
        .with_unit("{decisions}")
        .build()
});

/// Histogram of Service list call duration
///
/// Labels:
/// - `scope_kind`: cluster, namespace
pub static SERVICE_LIST_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("unik_service_list_duration_seconds")
        .with_description("Duration of Service list calls in seconds")
        .with_unit("s")
        .build()
});

/// Label for the admission decision counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionLabel {
    /// Request was admitted
    Allowed,
    /// Request was denied because of a duplicate value
    Denied,
    /// The decision could not be computed
    Error,
}

impl DecisionLabel {
    /// Convert to label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_labels() {
        assert_eq!(DecisionLabel::Allowed.as_str(), "allowed");
        assert_eq!(DecisionLabel::Denied.as_str(), "denied");
        assert_eq!(DecisionLabel::Error.as_str(), "error");
    }

    #[test]
    fn test_instruments_record_without_provider() {
        use opentelemetry::KeyValue;

        ADMISSION_DECISIONS.add(1, &[KeyValue::new("decision", "allowed")]);
        SERVICE_LIST_DURATION.record(0.01, &[KeyValue::new("scope_kind", "cluster")]);
    }
}
