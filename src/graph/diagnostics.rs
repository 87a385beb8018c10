//! Structured record of attribute predicates that failed internally and were
//! recovered by treating them as don't-care.

use std::sync::Mutex;

use serde::Serialize;

use crate::error::PropertyError;

/// One recovered predicate failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateFailure {
    pub vertex_id: String,
    pub attribute_name: String,
    pub reason: String,
}

/// Per-engine collector of [`PredicateFailure`] events.
#[derive(Debug, Default)]
pub struct Diagnostics {
    failures: Mutex<Vec<PredicateFailure>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, vertex_id: &str, attribute_name: &str, err: &PropertyError) {
        log::warn!(
            "attribute predicate '{}' on vertex {} recovered: {}",
            attribute_name,
            vertex_id,
            err
        );
        let failure = PredicateFailure {
            vertex_id: vertex_id.to_string(),
            attribute_name: attribute_name.to_string(),
            reason: err.to_string(),
        };
        // A poisoned lock only means another reader panicked mid-push.
        match self.failures.lock() {
            Ok(mut failures) => failures.push(failure),
            Err(poisoned) => poisoned.into_inner().push(failure),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.snapshot().len()
    }

    pub fn snapshot(&self) -> Vec<PredicateFailure> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.failure_count(), 0);

        let err = PropertyError::Ambiguous {
            vertex_id: "v1".to_string(),
            name: "size".to_string(),
            count: 2,
        };
        diagnostics.record("v1", "size", &err);

        let failures = diagnostics.snapshot();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].vertex_id, "v1");
        assert_eq!(failures[0].attribute_name, "size");
        assert!(failures[0].reason.contains("conflicting"));
    }
}
