//! Matchers: pure predicates deciding whether an observer receives an event.
//!
//! Matchers hold only the values captured at construction and never mutate,
//! so one matcher can be evaluated from many threads at once.
//!
//! Two factories cover the observer forms the runtime uses:
//!
//! - [`create_event_matcher`]: exact leaf name and exact creator. The form
//!   ordinary observers use for an instance's own events.
//! - [`create_internal_event_matcher`]: full path under the `run` root,
//!   internal flag set, exact creator. Lets framework code pick out
//!   bookkeeping events that share a leaf name with user-facing ones.
//!
//! Both accept an optional parent run id restricting matches to events of
//! runs spawned by that run.

use std::fmt;

use crate::error::InvalidNameError;
use crate::event::EventMeta;
use crate::instance::{InstanceId, RunInstance};
use crate::namespace::validate_name;
use crate::trace::scope_matches;

/// Root segment under which run lifecycle events are emitted.
pub const RUN_ROOT: &str = "run";

/// A pure predicate over [`EventMeta`].
pub trait Matcher: Send + Sync {
    fn matches(&self, event: &EventMeta) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&EventMeta) -> bool + Send + Sync,
{
    fn matches(&self, event: &EventMeta) -> bool {
        self(event)
    }
}

/// Matches events with an exact leaf name from an exact instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMatcher {
    name: String,
    instance: InstanceId,
    parent_run_id: Option<String>,
}

impl EventMatcher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn parent_run_id(&self) -> Option<&str> {
        self.parent_run_id.as_deref()
    }
}

impl Matcher for EventMatcher {
    fn matches(&self, event: &EventMeta) -> bool {
        scope_matches(event.trace.as_ref(), self.parent_run_id.as_deref())
            && event.name == self.name
            && event.created_by(self.instance)
    }
}

/// Matches internal events at `run.<instance namespace>.<name>` from an
/// exact instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEventMatcher {
    path: String,
    instance: InstanceId,
    parent_run_id: Option<String>,
}

impl InternalEventMatcher {
    /// The full path this matcher expects.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn parent_run_id(&self) -> Option<&str> {
        self.parent_run_id.as_deref()
    }
}

impl Matcher for InternalEventMatcher {
    fn matches(&self, event: &EventMeta) -> bool {
        scope_matches(event.trace.as_ref(), self.parent_run_id.as_deref())
            && event.path == self.path
            && event.is_internal()
            && event.created_by(self.instance)
    }
}

/// Build a matcher for the events named `name` emitted by `instance`.
pub fn create_event_matcher(
    name: &str,
    instance: &dyn RunInstance,
    parent_run_id: Option<&str>,
) -> Result<EventMatcher, InvalidNameError> {
    validate_name(name)?;
    Ok(EventMatcher {
        name: name.to_string(),
        instance: instance.id(),
        parent_run_id: parent_run_id.map(str::to_string),
    })
}

/// Build a matcher for the internal events named `name` under the `run`
/// root and `instance`'s namespace.
pub fn create_internal_event_matcher(
    name: &str,
    instance: &dyn RunInstance,
    parent_run_id: Option<&str>,
) -> Result<InternalEventMatcher, InvalidNameError> {
    create_internal_event_matcher_with_root(RUN_ROOT, name, instance, parent_run_id)
}

/// Like [`create_internal_event_matcher`] with a different root segment.
///
/// A namespace that already starts with `root` is not prefixed again, so an
/// instance living at `run.agent` expects `run.agent.<name>`.
pub fn create_internal_event_matcher_with_root(
    root: &str,
    name: &str,
    instance: &dyn RunInstance,
    parent_run_id: Option<&str>,
) -> Result<InternalEventMatcher, InvalidNameError> {
    validate_name(name)?;
    let path = instance.namespace().rooted(root)?.path_for(name);
    Ok(InternalEventMatcher {
        path,
        instance: instance.id(),
        parent_run_id: parent_run_id.map(str::to_string),
    })
}

/// Matches every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyEvent;

impl Matcher for AnyEvent {
    fn matches(&self, _event: &EventMeta) -> bool {
        true
    }
}

/// Wraps a matcher and rejects internal events.
pub struct ExternalOnly<M>(pub M);

impl<M: Matcher> Matcher for ExternalOnly<M> {
    fn matches(&self, event: &EventMeta) -> bool {
        !event.is_internal() && self.0.matches(event)
    }
}

impl<M: fmt::Debug> fmt::Debug for ExternalOnly<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExternalOnly").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContext;
    use crate::instance::Instance;
    use crate::trace::EventTrace;
    use std::sync::Arc;

    fn agent_x() -> Instance {
        Instance::new(["run", "agentX"]).unwrap()
    }

    fn update_from(instance: &Instance) -> EventMeta {
        EventMeta::new("update", instance.namespace().path_for("update")).with_creator(instance.id())
    }

    #[test]
    fn event_matcher_requires_name_and_identity() {
        let i = agent_x();
        let j = agent_x();
        let matcher = create_event_matcher("update", &i, None).unwrap();

        assert!(matcher.matches(&update_from(&i)));
        // identical fields, different instance
        let mut other = update_from(&i);
        other.creator = Some(j.id());
        assert!(!matcher.matches(&other));

        let renamed = EventMeta::new("start", "run.agentX.start").with_creator(i.id());
        assert!(!matcher.matches(&renamed));

        let orphan = EventMeta::new("update", "run.agentX.update");
        assert!(!matcher.matches(&orphan));
    }

    #[test]
    fn event_matcher_ignores_path_and_internal_flag() {
        let i = agent_x();
        let matcher = create_event_matcher("update", &i, None).unwrap();
        let elsewhere = EventMeta::new("update", "somewhere.else.update")
            .with_creator(i.id())
            .with_context(EventContext::internal());
        assert!(matcher.matches(&elsewhere));
    }

    #[test]
    fn parent_run_scoping() {
        let i = agent_x();
        let matcher = create_event_matcher("update", &i, Some("r1")).unwrap();
        assert_eq!(matcher.parent_run_id(), Some("r1"));

        assert!(!matcher.matches(&update_from(&i)));
        assert!(matcher.matches(&update_from(&i).with_trace(EventTrace::new("g", "r9").with_parent("r1"))));
        assert!(!matcher.matches(&update_from(&i).with_trace(EventTrace::new("g", "r9").with_parent("r2"))));
        assert!(!matcher.matches(&update_from(&i).with_trace(EventTrace::new("g", "r1"))));
    }

    #[test]
    fn internal_matcher_requires_path_flag_and_identity() {
        let i = agent_x();
        let matcher = create_internal_event_matcher("update", &i, None).unwrap();
        assert_eq!(matcher.path(), "run.agentX.update");

        let internal = update_from(&i).with_context(EventContext::internal());
        assert!(matcher.matches(&internal));

        // same path, no flag
        assert!(!matcher.matches(&update_from(&i)));

        let flagged_false = update_from(&i).with_context(EventContext {
            internal: Some(false),
            ..Default::default()
        });
        assert!(!matcher.matches(&flagged_false));

        let mut foreign = internal.clone();
        foreign.creator = Some(agent_x().id());
        assert!(!matcher.matches(&foreign));

        let wrong_path = EventMeta::new("update", "run.agentY.update")
            .with_creator(i.id())
            .with_context(EventContext::internal());
        assert!(!matcher.matches(&wrong_path));
    }

    #[test]
    fn internal_matcher_prefixes_run_root() {
        let agent = Instance::new(["agent", "react"]).unwrap();
        let matcher = create_internal_event_matcher("start", &agent, None).unwrap();
        assert_eq!(matcher.path(), "run.agent.react.start");

        let custom = create_internal_event_matcher_with_root("exec", "start", &agent, None).unwrap();
        assert_eq!(custom.path(), "exec.agent.react.start");
    }

    #[test]
    fn internal_matcher_parent_scoping() {
        let i = agent_x();
        let matcher = create_internal_event_matcher("update", &i, Some("r1")).unwrap();
        let base = update_from(&i).with_context(EventContext::internal());
        assert!(!matcher.matches(&base));
        assert!(matcher.matches(&base.clone().with_trace(EventTrace::new("g", "r9").with_parent("r1"))));
        assert!(!matcher.matches(&base.with_trace(EventTrace::new("g", "r9").with_parent("r2"))));
    }

    #[test]
    fn factories_reject_invalid_names() {
        let i = agent_x();
        assert!(create_event_matcher("", &i, None).is_err());
        assert!(create_event_matcher("new-token", &i, None).is_err());
        assert!(create_internal_event_matcher("a.b", &i, None).is_err());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let i = agent_x();
        let external = create_event_matcher("update", &i, None).unwrap();
        let internal = create_internal_event_matcher("update", &i, None).unwrap();
        let event = update_from(&i).with_context(EventContext::internal());
        for _ in 0..3 {
            assert!(external.matches(&event));
            assert!(internal.matches(&event));
        }
    }

    #[test]
    fn matchers_evaluate_concurrently() {
        let i = agent_x();
        let matcher = Arc::new(create_event_matcher("update", &i, None).unwrap());
        let event = Arc::new(update_from(&i));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let matcher = Arc::clone(&matcher);
                let event = Arc::clone(&event);
                std::thread::spawn(move || matcher.matches(&event))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn closures_and_wrappers() {
        let by_path = |e: &EventMeta| e.path.starts_with("run.");
        let event = EventMeta::new("update", "run.agentX.update");
        assert!(by_path.matches(&event));
        assert!(AnyEvent.matches(&event));

        let external = ExternalOnly(AnyEvent);
        assert!(external.matches(&event));
        assert!(!external.matches(&event.with_context(EventContext::internal())));
    }
}
