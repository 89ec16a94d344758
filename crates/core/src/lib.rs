//! # runwire Core
//!
//! Event emission and matching for agent runtimes. Instances (agents, tools,
//! models) publish lifecycle events into a hierarchical namespace; observers
//! register matchers that decide which events they receive.
//!
//! ## Layout
//!
//! - [`namespace`] — name grammar and the validated [`Namespace`]
//! - [`event`] — [`EventMeta`], the immutable record of one emission
//! - [`trace`] — run lineage and run-scope checks
//! - [`matcher`] — the [`Matcher`] predicate and the matcher factories
//! - [`selector`] — declarative selectors accepted by [`Emitter::on`]
//! - [`emitter`] — the synchronous dispatch core
//! - [`run`] — run contexts producing traces and lifecycle events
//!
//! Validation errors surface when namespaces, emitters and matchers are
//! built. Matching itself never fails.

pub mod error;
pub mod namespace;
pub mod instance;
pub mod trace;
pub mod event;
pub mod matcher;
pub mod selector;
pub mod emitter;
pub mod run;

// Re-export key types at crate root for ergonomics
pub use error::{EmitterError, Error, InvalidNameError, Result, RunError};
pub use namespace::{Namespace, validate_name, validate_namespace};
pub use instance::{Instance, InstanceId, RunInstance};
pub use trace::{EventTrace, in_run_scope};
pub use event::{EventContext, EventMeta};
pub use matcher::{
    EventMatcher, InternalEventMatcher, Matcher, RUN_ROOT, create_event_matcher,
    create_internal_event_matcher, create_internal_event_matcher_with_root,
};
pub use selector::Selector;
pub use emitter::{
    CallbackError, ChildOptions, EmitOptions, EmittedEvent, Emitter, EmitterOptions, ListenerId,
    ListenerOptions,
};
pub use run::RunContext;
