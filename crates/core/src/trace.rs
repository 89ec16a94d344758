//! Run lineage attached to events, and the run-scope check used by matchers.
//!
//! Scoping is a single-level comparison: an event belongs to run `r` when its
//! trace names `r` as the immediate parent run. Whoever builds nested traces
//! is responsible for filling `parent_run_id` with the run it should be
//! observed under.

use serde::{Deserialize, Serialize};

/// Which execution produced an event, and which execution spawned that one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTrace {
    /// Groups every run of one top-level invocation.
    pub id: String,
    /// The run that emitted the event.
    pub run_id: String,
    /// The run that spawned `run_id`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
}

impl EventTrace {
    pub fn new(id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run_id: run_id.into(),
            parent_run_id: None,
        }
    }

    pub fn with_parent(mut self, parent_run_id: impl Into<String>) -> Self {
        self.parent_run_id = Some(parent_run_id.into());
        self
    }
}

/// Whether an event with `trace` belongs to the scope of `parent_run_id`.
///
/// A missing trace never matches.
pub fn in_run_scope(trace: Option<&EventTrace>, parent_run_id: &str) -> bool {
    trace
        .and_then(|t| t.parent_run_id.as_deref())
        .is_some_and(|parent| parent == parent_run_id)
}

/// Optional scoping: `None` accepts every event.
pub fn scope_matches(trace: Option<&EventTrace>, parent_run_id: Option<&str>) -> bool {
    match parent_run_id {
        Some(parent) => in_run_scope(trace, parent),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_trace_never_in_scope() {
        assert!(!in_run_scope(None, "r1"));
    }

    #[test]
    fn matching_parent_in_scope() {
        let trace = EventTrace::new("g", "r9").with_parent("r1");
        assert!(in_run_scope(Some(&trace), "r1"));
        assert!(!in_run_scope(Some(&trace), "r2"));
    }

    #[test]
    fn scope_is_not_transitive() {
        // r1 spawned r5 which spawned r9: r9's events are not in r1's scope.
        let trace = EventTrace::new("g", "r9").with_parent("r5");
        assert!(!in_run_scope(Some(&trace), "r1"));
    }

    #[test]
    fn own_run_id_is_not_parent() {
        let trace = EventTrace::new("g", "r1");
        assert!(!in_run_scope(Some(&trace), "r1"));
    }

    #[test]
    fn unscoped_accepts_everything() {
        assert!(scope_matches(None, None));
        let trace = EventTrace::new("g", "r1");
        assert!(scope_matches(Some(&trace), None));
        assert!(!scope_matches(Some(&trace), Some("r0")));
    }

    #[test]
    fn trace_serialization_omits_missing_parent() {
        let json = serde_json::to_string(&EventTrace::new("g", "r1")).unwrap();
        assert!(!json.contains("parent_run_id"));
        let json = serde_json::to_string(&EventTrace::new("g", "r2").with_parent("r1")).unwrap();
        assert!(json.contains(r#""parent_run_id":"r1""#));
    }
}
