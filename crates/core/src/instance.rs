//! Instance identity.
//!
//! Events remember *who* emitted them by handle, not by value: two instances
//! built from the same data are still different event sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::emitter::{Emitter, EmitterOptions};
use crate::error::InvalidNameError;
use crate::namespace::Namespace;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identity of an event source.
///
/// Only [`InstanceId::allocate`] produces new values, so equality is
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a fresh identity.
    pub fn allocate() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A component that owns an emitter scope (agent, tool, model...).
pub trait RunInstance: Send + Sync {
    /// The identity events from this instance carry as their creator.
    fn id(&self) -> InstanceId;

    /// The emitter owned by this instance.
    fn emitter(&self) -> &Emitter;

    /// Shorthand for the emitter's namespace.
    fn namespace(&self) -> &Namespace {
        self.emitter().namespace()
    }
}

/// A plain instance: an identity plus its own emitter.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    emitter: Emitter,
}

impl Instance {
    /// Create an instance with a fresh identity and its own listener registry.
    pub fn new<I, S>(namespace: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_options(namespace, EmitterOptions::default())
    }

    pub fn with_options<I, S>(namespace: I, options: EmitterOptions) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespace = Namespace::new(namespace)?;
        let id = InstanceId::allocate();
        Ok(Self {
            id,
            emitter: Emitter::for_instance(id, namespace, options),
        })
    }

    /// Create an instance nested under `parent`: its namespace extends the
    /// parent's and it shares the parent's listener registry.
    pub fn nested<I, S>(parent: &dyn RunInstance, segments: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespace = parent.namespace().extend(segments)?;
        let id = InstanceId::allocate();
        Ok(Self {
            id,
            emitter: parent.emitter().scoped(namespace, Some(id)),
        })
    }
}

impl RunInstance for Instance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn emitter(&self) -> &Emitter {
        &self.emitter
    }
}
