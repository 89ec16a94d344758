//! The dispatch core.
//!
//! An [`Emitter`] owns a namespace and a handle to a listener registry.
//! Child emitters share their parent's registry, so one observer registered
//! high in the tree can see events emitted anywhere below it.
//!
//! Dispatch is synchronous: `emit` builds the [`EventMeta`], evaluates every
//! listener registered when the call started, and runs matching callbacks in
//! registration order before returning.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{EmitterError, InvalidNameError};
use crate::event::{EventContext, EventMeta};
use crate::instance::InstanceId;
use crate::matcher::{AnyEvent, Matcher, RUN_ROOT};
use crate::namespace::{Namespace, validate_name};
use crate::selector::Selector;
use crate::trace::EventTrace;

/// Error type observer callbacks may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

type Callback = dyn Fn(&serde_json::Value, &EventMeta) -> Result<(), CallbackError> + Send + Sync;

/// Registry-wide settings, fixed when the root emitter is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterOptions {
    /// Log every listener match at `trace` level.
    pub trace_dispatch: bool,
    /// Warn once the registry holds more listeners than this (0 = unlimited).
    pub max_listeners: usize,
    /// Root segment for run lifecycle events.
    pub root_namespace: String,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        Self {
            trace_dispatch: false,
            max_listeners: 0,
            root_namespace: RUN_ROOT.to_string(),
        }
    }
}

/// Handle identifying one registered observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-listener behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
    /// Let name/path/wildcard selectors see internal events too.
    pub match_internal: bool,
}

/// What a child emitter changes relative to its parent.
#[derive(Debug, Clone, Default)]
pub struct ChildOptions {
    /// Segments appended to the parent's namespace.
    pub namespace: Vec<String>,
    /// Replaces the parent's creator when set.
    pub creator: Option<InstanceId>,
    /// Merged over the parent's context.
    pub context: EventContext,
    /// Replaces the parent's trace when set.
    pub trace: Option<EventTrace>,
    /// Replaces the parent's group when set.
    pub group_id: Option<String>,
}

/// Per-emission overrides.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Merged over the emitter's context.
    pub context: EventContext,
    /// Replaces the emitter's trace when set.
    pub trace: Option<EventTrace>,
}

/// An event forwarded to an async consumer by [`Emitter::stream`].
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub data: serde_json::Value,
    pub meta: EventMeta,
}

struct Listener {
    id: ListenerId,
    matcher: Arc<dyn Matcher>,
    callback: Arc<Callback>,
    once: bool,
    fired: AtomicBool,
}

/// Serializes pipe creation so two registries cannot pipe into each other
/// concurrently.
static PIPE_TOPOLOGY: Mutex<()> = Mutex::new(());

/// Listener set shared by an emitter tree.
struct Registry {
    listeners: RwLock<Vec<Arc<Listener>>>,
    /// Outgoing pipes, keyed by the forwarding listener.
    pipes: Mutex<Vec<(ListenerId, Weak<Registry>)>>,
    next_id: AtomicU64,
    options: EmitterOptions,
}

impl Registry {
    fn new(options: EmitterOptions) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            pipes: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            options,
        }
    }

    fn add(&self, matcher: Arc<dyn Matcher>, callback: Arc<Callback>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.push(Arc::new(Listener {
            id,
            matcher,
            callback,
            once,
            fired: AtomicBool::new(false),
        }));

        let max = self.options.max_listeners;
        if max > 0 && listeners.len() > max {
            warn!(
                listeners = listeners.len(),
                max_listeners = max,
                "Listener count exceeds configured maximum, possible leak"
            );
        }
        id
    }

    fn remove(&self, ids: &[ListenerId]) -> usize {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !ids.contains(&l.id));
        let removed = before - listeners.len();
        drop(listeners);

        if removed > 0 {
            self.pipes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| !ids.contains(id));
        }
        removed
    }

    /// Whether events dispatched here end up in `target`, directly or
    /// through pipes.
    fn reaches(self: &Arc<Self>, target: &Arc<Registry>) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![Arc::clone(self)];
        while let Some(registry) = pending.pop() {
            if Arc::ptr_eq(&registry, target) {
                return true;
            }
            if !visited.insert(Arc::as_ptr(&registry)) {
                continue;
            }
            let pipes = registry.pipes.lock().unwrap_or_else(PoisonError::into_inner);
            pending.extend(pipes.iter().filter_map(|(_, downstream)| downstream.upgrade()));
        }
        false
    }

    fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn dispatch(&self, data: &serde_json::Value, meta: &EventMeta) -> Result<(), EmitterError> {
        // Callbacks may register or cancel listeners, so work on a snapshot.
        let snapshot: Vec<Arc<Listener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut spent = Vec::new();
        let mut outcome = Ok(());

        for listener in &snapshot {
            if !listener.matcher.matches(meta) {
                continue;
            }
            if listener.once {
                if listener.fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                spent.push(listener.id);
            }
            if self.options.trace_dispatch {
                trace!(path = %meta.path, listener = %listener.id, "Listener matched");
            }
            if let Err(e) = (listener.callback)(data, meta) {
                outcome = Err(EmitterError::Callback {
                    path: meta.path.clone(),
                    message: e.to_string(),
                });
                break;
            }
        }

        if !spent.is_empty() {
            self.remove(&spent);
        }
        outcome
    }
}

/// Emits events from one namespace into a shared listener registry.
pub struct Emitter {
    namespace: Namespace,
    creator: Option<InstanceId>,
    context: EventContext,
    trace: Option<EventTrace>,
    group_id: Option<String>,
    registry: Arc<Registry>,
    owned: Mutex<Vec<ListenerId>>,
    destroyed: AtomicBool,
}

impl Emitter {
    /// An emitter at the root namespace with its own registry.
    pub fn root() -> Self {
        Self::new(Namespace::root(), EmitterOptions::default())
    }

    /// An emitter with its own registry and no creator.
    pub fn new(namespace: Namespace, options: EmitterOptions) -> Self {
        Self::build(namespace, None, Arc::new(Registry::new(options)))
    }

    /// An emitter with its own registry whose events carry `creator`.
    pub fn for_instance(creator: InstanceId, namespace: Namespace, options: EmitterOptions) -> Self {
        Self::build(namespace, Some(creator), Arc::new(Registry::new(options)))
    }

    fn build(namespace: Namespace, creator: Option<InstanceId>, registry: Arc<Registry>) -> Self {
        Self {
            namespace,
            creator,
            context: EventContext::default(),
            trace: None,
            group_id: None,
            registry,
            owned: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// A child emitter sharing this emitter's registry.
    pub fn child(&self, options: ChildOptions) -> Result<Emitter, InvalidNameError> {
        let namespace = self.namespace.extend(options.namespace)?;
        Ok(Self {
            namespace,
            creator: options.creator.or(self.creator),
            context: self.context.merged(&options.context),
            trace: options.trace.or_else(|| self.trace.clone()),
            group_id: options.group_id.or_else(|| self.group_id.clone()),
            registry: Arc::clone(&self.registry),
            owned: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        })
    }

    /// A sibling at an absolute `namespace` sharing this emitter's registry,
    /// context and trace.
    pub(crate) fn scoped(&self, namespace: Namespace, creator: Option<InstanceId>) -> Emitter {
        Self {
            namespace,
            creator: creator.or(self.creator),
            context: self.context.clone(),
            trace: self.trace.clone(),
            group_id: self.group_id.clone(),
            registry: Arc::clone(&self.registry),
            owned: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_context(mut self, context: EventContext) -> Self {
        self.context = self.context.merged(&context);
        self
    }

    pub(crate) fn with_trace(mut self, trace: EventTrace, group_id: Option<String>) -> Self {
        self.trace = Some(trace);
        if group_id.is_some() {
            self.group_id = group_id;
        }
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn creator(&self) -> Option<InstanceId> {
        self.creator
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    pub fn trace(&self) -> Option<&EventTrace> {
        self.trace.as_ref()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn options(&self) -> &EmitterOptions {
        &self.registry.options
    }

    /// Whether both emitters dispatch into the same registry.
    pub fn shares_registry_with(&self, other: &Emitter) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }

    /// Whether events emitted here reach `other`'s listeners, through a
    /// shared registry or a chain of pipes.
    pub fn forwards_to(&self, other: &Emitter) -> bool {
        self.registry.reaches(&other.registry)
    }

    /// Number of listeners in the shared registry.
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Register `callback` for events matching `selector`.
    pub fn on<F>(&self, selector: Selector, callback: F) -> Result<ListenerId, EmitterError>
    where
        F: Fn(&serde_json::Value, &EventMeta) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_with(selector, callback, ListenerOptions::default())
    }

    /// Like [`on`](Self::on), removed after the first invocation.
    pub fn once<F>(&self, selector: Selector, callback: F) -> Result<ListenerId, EmitterError>
    where
        F: Fn(&serde_json::Value, &EventMeta) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_with(
            selector,
            callback,
            ListenerOptions {
                once: true,
                ..ListenerOptions::default()
            },
        )
    }

    pub fn on_with<F>(
        &self,
        selector: Selector,
        callback: F,
        options: ListenerOptions,
    ) -> Result<ListenerId, EmitterError>
    where
        F: Fn(&serde_json::Value, &EventMeta) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        let matcher = selector.bind(&self.namespace, options.match_internal)?;
        Ok(self.register(matcher, Arc::new(callback), options.once))
    }

    fn register(&self, matcher: Arc<dyn Matcher>, callback: Arc<Callback>, once: bool) -> ListenerId {
        let id = self.registry.add(matcher, callback, once);
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        debug!(namespace = %self.namespace, listener = %id, once, "Registered listener");
        id
    }

    /// Cancel an observation. Returns whether it was still registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|owned| *owned != id);
        let removed = self.registry.remove(&[id]) > 0;
        if removed {
            debug!(namespace = %self.namespace, listener = %id, "Removed listener");
        }
        removed
    }

    /// Forward matching events to an async consumer.
    ///
    /// The listener stays registered until [`off`](Self::off) or
    /// [`destroy`](Self::destroy); events arriving after the receiver is
    /// dropped are discarded.
    pub fn stream(
        &self,
        selector: Selector,
        options: ListenerOptions,
    ) -> Result<(ListenerId, mpsc::UnboundedReceiver<EmittedEvent>), EmitterError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_with(
            selector,
            move |data, meta| {
                // Receiver gone = nobody is listening anymore, that's fine
                let _ = tx.send(EmittedEvent {
                    data: data.clone(),
                    meta: meta.clone(),
                });
                Ok(())
            },
            options,
        )?;
        Ok((id, rx))
    }

    /// Re-dispatch every event of this registry (internal ones included)
    /// into `target`'s registry.
    ///
    /// Fails with [`EmitterError::PipeCycle`] when `target` already forwards
    /// into this registry.
    pub fn pipe(&self, target: &Emitter) -> Result<ListenerId, EmitterError> {
        self.ensure_alive()?;
        if self.shares_registry_with(target) {
            return Err(EmitterError::SelfPipe);
        }

        let _topology = PIPE_TOPOLOGY.lock().unwrap_or_else(PoisonError::into_inner);
        if target.forwards_to(self) {
            return Err(EmitterError::PipeCycle {
                from: self.namespace.join(),
                to: target.namespace.join(),
            });
        }

        let downstream = Arc::clone(&target.registry);
        let forward: Arc<Callback> = Arc::new(move |data: &serde_json::Value, meta: &EventMeta| {
            downstream
                .dispatch(data, meta)
                .map_err(|e| Box::new(e) as CallbackError)
        });
        let id = self.register(Arc::new(AnyEvent), forward, false);
        self.registry
            .pipes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::downgrade(&target.registry)));
        debug!(from = %self.namespace, to = %target.namespace, listener = %id, "Piped registry");
        Ok(id)
    }

    /// Emit `name` with `data` as payload.
    pub fn emit(&self, name: &str, data: impl Serialize) -> Result<(), EmitterError> {
        self.emit_with(name, data, EmitOptions::default())
    }

    pub fn emit_with(
        &self,
        name: &str,
        data: impl Serialize,
        options: EmitOptions,
    ) -> Result<(), EmitterError> {
        self.ensure_alive()?;
        validate_name(name)?;
        let data = serde_json::to_value(data)?;

        let mut meta = EventMeta::new(name, self.namespace.path_for(name))
            .with_context(self.context.merged(&options.context));
        meta.creator = self.creator;
        meta.trace = options.trace.or_else(|| self.trace.clone());
        meta.group_id = self.group_id.clone();

        self.registry.dispatch(&data, &meta)
    }

    /// Remove every listener registered through this emitter and refuse
    /// further use. Children are unaffected.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let owned = std::mem::take(&mut *self.owned.lock().unwrap_or_else(PoisonError::into_inner));
        let removed = self.registry.remove(&owned);
        debug!(namespace = %self.namespace, removed, "Emitter destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<(), EmitterError> {
        if self.is_destroyed() {
            return Err(EmitterError::Destroyed {
                path: self.namespace.join(),
            });
        }
        Ok(())
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        let owned = std::mem::take(self.owned.get_mut().unwrap_or_else(PoisonError::into_inner));
        if !owned.is_empty() {
            self.registry.remove(&owned);
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("namespace", &self.namespace.join())
            .field("creator", &self.creator)
            .field("trace", &self.trace)
            .field("listeners", &self.listener_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
