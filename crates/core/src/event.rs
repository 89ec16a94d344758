//! Event metadata: the immutable description of one emission.
//!
//! An [`EventMeta`] is built once per `emit`, handed to every matcher and
//! callback by reference, and dropped when dispatch finishes. Observers that
//! want to keep it must clone it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instance::InstanceId;
use crate::trace::{self, EventTrace};

/// Out-of-band flags attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Marks framework bookkeeping events. Absent means `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,

    /// Anything else callers want to carry along.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventContext {
    /// A context flagging internal events.
    pub fn internal() -> Self {
        Self {
            internal: Some(true),
            ..Self::default()
        }
    }

    pub fn is_internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Overlay `other` on top of `self`: its flag wins when set, its extra
    /// keys replace ours.
    pub fn merged(&self, other: &EventContext) -> Self {
        let mut merged = self.clone();
        if other.internal.is_some() {
            merged.internal = other.internal;
        }
        for (key, value) in &other.extra {
            merged.extra.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Immutable description of one emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique per emission.
    pub id: Uuid,
    /// The leaf event name (e.g. `update`).
    pub name: String,
    /// `namespace + name`, dot-joined.
    pub path: String,
    /// The instance that emitted the event, if the emitter has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<InstanceId>,
    pub context: EventContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<EventTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventMeta {
    /// Build metadata for a fresh emission.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: path.into(),
            creator: None,
            context: EventContext::default(),
            trace: None,
            group_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_creator(mut self, creator: InstanceId) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_trace(mut self, trace: EventTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn is_internal(&self) -> bool {
        self.context.is_internal()
    }

    pub fn created_by(&self, instance: InstanceId) -> bool {
        self.creator == Some(instance)
    }

    /// Whether this event was produced by a run spawned by `parent_run_id`.
    pub fn belongs_to_run(&self, parent_run_id: &str) -> bool {
        trace::in_run_scope(self.trace.as_ref(), parent_run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_defaults_to_false() {
        assert!(!EventContext::default().is_internal());
        assert!(EventContext::internal().is_internal());
        let explicit_false = EventContext {
            internal: Some(false),
            ..Default::default()
        };
        assert!(!explicit_false.is_internal());
    }

    #[test]
    fn merge_keeps_flag_unless_overridden() {
        let base = EventContext::internal().with("source", serde_json::json!("agent"));
        let overlay = EventContext::default().with("step", serde_json::json!(3));
        let merged = base.merged(&overlay);
        assert!(merged.is_internal());
        assert_eq!(merged.extra["source"], "agent");
        assert_eq!(merged.extra["step"], 3);

        let off = EventContext {
            internal: Some(false),
            ..Default::default()
        };
        assert!(!base.merged(&off).is_internal());
    }

    #[test]
    fn context_serializes_flat() {
        let ctx = EventContext::internal().with("retry", serde_json::json!(2));
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"internal": true, "retry": 2}));

        let parsed: EventContext = serde_json::from_value(serde_json::json!({"step": 1})).unwrap();
        assert_eq!(parsed.internal, None);
        assert_eq!(parsed.extra["step"], 1);
    }

    #[test]
    fn meta_builders() {
        let creator = InstanceId::allocate();
        let meta = EventMeta::new("update", "agent.update")
            .with_creator(creator)
            .with_context(EventContext::internal())
            .with_trace(EventTrace::new("g", "r2").with_parent("r1"))
            .with_group("g");

        assert!(meta.created_by(creator));
        assert!(!meta.created_by(InstanceId::allocate()));
        assert!(meta.is_internal());
        assert!(meta.belongs_to_run("r1"));
        assert!(!meta.belongs_to_run("r2"));
        assert_eq!(meta.group_id.as_deref(), Some("g"));
    }

    #[test]
    fn each_emission_gets_its_own_id() {
        let a = EventMeta::new("update", "update");
        let b = EventMeta::new("update", "update");
        assert_ne!(a.id, b.id);
    }
}
