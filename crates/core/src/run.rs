//! Run contexts. One execution of an instance, and the traces its events carry.
//!
//! A run gets a fresh `run_id`; a run started from inside another run (a
//! tool call made by an agent, say) records the outer run as its
//! `parent_run_id` and shares its group id. Every event emitted through the
//! run's emitter carries that trace, which is what parent-run scoped
//! matchers filter on.
//!
//! Lifecycle events (`start`, `success` / `error`, `finish`) are emitted as
//! internal events under `<root>.<instance namespace>`, the path
//! [`create_internal_event_matcher`](crate::matcher::create_internal_event_matcher)
//! expects.

use serde::Serialize;
use serde_json::json;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::emitter::{Emitter, ListenerId};
use crate::error::{EmitterError, RunError};
use crate::event::EventContext;
use crate::instance::{InstanceId, RunInstance};
use crate::trace::EventTrace;

pub const START_EVENT: &str = "start";
pub const SUCCESS_EVENT: &str = "success";
pub const ERROR_EVENT: &str = "error";
pub const FINISH_EVENT: &str = "finish";

/// One execution of an instance.
#[derive(Debug)]
pub struct RunContext {
    trace: EventTrace,
    instance: InstanceId,
    emitter: Emitter,
    lifecycle: Emitter,
    upstream: Option<ListenerId>,
}

impl RunContext {
    /// Begin a top-level run of `instance`.
    pub fn start(instance: &dyn RunInstance) -> Result<Self, EmitterError> {
        let trace = EventTrace::new(Uuid::new_v4().to_string(), Uuid::new_v4().to_string());
        Self::build(instance, trace)
    }

    /// Begin a run of `instance` spawned by this run.
    ///
    /// When `instance` dispatches into a different registry than this run,
    /// its events are piped into this run's registry until the child run
    /// finishes, so observers of the outer run see the nested one.
    pub fn child(&self, instance: &dyn RunInstance) -> Result<Self, EmitterError> {
        let trace = EventTrace::new(self.trace.id.clone(), Uuid::new_v4().to_string())
            .with_parent(self.trace.run_id.clone());
        let mut ctx = Self::build(instance, trace)?;
        if ctx.emitter.forwards_to(&self.emitter) {
            return Ok(ctx);
        }
        if self.emitter.forwards_to(&ctx.emitter) {
            // Re-entering an instance further up the chain: its registry
            // already receives this run's events, piping back would loop.
            debug!(
                run_id = %ctx.trace.run_id,
                namespace = %ctx.emitter.namespace(),
                "Nested run not piped, registry already upstream"
            );
            return Ok(ctx);
        }
        ctx.upstream = Some(ctx.emitter.pipe(&self.emitter)?);
        Ok(ctx)
    }

    fn build(instance: &dyn RunInstance, trace: EventTrace) -> Result<Self, EmitterError> {
        let base = instance.emitter();
        let group = Some(trace.id.clone());
        let lifecycle_ns = base.namespace().rooted(&base.options().root_namespace)?;

        let emitter = base
            .scoped(base.namespace().clone(), Some(instance.id()))
            .with_trace(trace.clone(), group.clone());
        let lifecycle = base
            .scoped(lifecycle_ns, Some(instance.id()))
            .with_trace(trace.clone(), group)
            .with_context(EventContext::internal());

        debug!(
            run_id = %trace.run_id,
            parent_run_id = ?trace.parent_run_id,
            namespace = %base.namespace(),
            "Run created"
        );

        Ok(Self {
            trace,
            instance: instance.id(),
            emitter,
            lifecycle,
            upstream: None,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.trace.run_id
    }

    pub fn parent_run_id(&self) -> Option<&str> {
        self.trace.parent_run_id.as_deref()
    }

    pub fn group_id(&self) -> &str {
        &self.trace.id
    }

    pub fn trace(&self) -> &EventTrace {
        &self.trace
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The emitter for user-facing events of this run.
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Register observers before the run starts. They are removed when the
    /// run finishes, or right away when `setup` fails.
    pub fn observe<F>(self, setup: F) -> Result<Self, EmitterError>
    where
        F: FnOnce(&Emitter) -> Result<(), EmitterError>,
    {
        setup(&self.emitter)?;
        Ok(self)
    }

    /// Execute `body`, bracketing it with lifecycle events.
    ///
    /// `success` carries the serialized output, `error` the failure message;
    /// `finish` always follows either. Observers registered on this run are
    /// dropped afterwards. A context dropped without running is torn down
    /// the same way, minus the lifecycle events.
    pub fn run<T, E, F>(self, body: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(&RunContext) -> Result<T, E>,
        T: Serialize,
        E: fmt::Display,
    {
        self.execute(body)
    }

    fn execute<T, E, F>(&self, body: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(&RunContext) -> Result<T, E>,
        T: Serialize,
        E: fmt::Display,
    {
        let lifecycle_failed = |source: EmitterError| -> RunError<E> {
            RunError::Emitter {
                run_id: self.run_id().to_string(),
                source,
            }
        };

        self.lifecycle
            .emit(START_EVENT, json!({ "run_id": self.run_id() }))
            .map_err(lifecycle_failed)?;

        let outcome = body(self);
        match &outcome {
            Ok(output) => self.lifecycle.emit(SUCCESS_EVENT, output),
            Err(e) => self
                .lifecycle
                .emit(ERROR_EVENT, json!({ "message": e.to_string() })),
        }
        .map_err(lifecycle_failed)?;
        self.lifecycle
            .emit(FINISH_EVENT, json!(null))
            .map_err(lifecycle_failed)?;

        outcome.map_err(|error| RunError::Failed {
            run_id: self.run_id().to_string(),
            error,
        })
    }

    fn close(&mut self) {
        if let Some(pipe) = self.upstream.take() {
            self.emitter.off(pipe);
        }
        self.emitter.destroy();
        self.lifecycle.destroy();
        debug!(run_id = %self.trace.run_id, "Run closed");
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.close();
    }
}
