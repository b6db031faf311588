//! Ownership of native resources.
//!
//! Every handle the engine returns is wrapped immediately into an
//! [`ExternalHandle`]. The handle records its kind, so the free function is
//! always chosen from the kind and never supplied by the caller.
//!
//! ## Lifecycle
//!
//! ```text
//!            release() / last drop
//!   Live ──────────────────────────▶ Released
//!     │
//!     └── consumed by the engine ──▶ Transferred
//! ```
//!
//! Both terminal states absorb every later release. Dropping the last clone
//! of a handle runs its finalizer, which frees the resource only if it is
//! still live.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use embedoc_engine::{Engine, EngineStatus, RawHandle, ResourceKind};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// State of an [`ExternalHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Owns its native resource.
    Live,
    /// The resource was freed.
    Released,
    /// The resource was consumed by an engine call and belongs to another
    /// structure now.
    Transferred,
}

/// Registry counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Handles registered.
    pub registered: u64,
    /// Resources freed by an explicit release.
    pub released_explicitly: u64,
    /// Resources freed by a finalizer.
    pub released_by_finalizer: u64,
    /// Resources consumed by the engine.
    pub transferred: u64,
    live: BTreeMap<ResourceKind, u64>,
}

impl RegistryStats {
    /// Live handles of one kind.
    pub fn live(&self, kind: ResourceKind) -> u64 {
        self.live.get(&kind).copied().unwrap_or(0)
    }

    /// Live handles of all kinds.
    pub fn total_live(&self) -> u64 {
        self.live.values().sum()
    }

    fn on_register(&mut self, kind: ResourceKind) {
        self.registered += 1;
        *self.live.entry(kind).or_insert(0) += 1;
    }

    fn on_end(&mut self, kind: ResourceKind) {
        if let Some(n) = self.live.get_mut(&kind) {
            *n = n.saturating_sub(1);
        }
    }
}

struct RegistryInner {
    engine: Rc<dyn Engine>,
    config: BridgeConfig,
    stats: RefCell<RegistryStats>,
}

/// Binds native resources to host-visible handles.
///
/// Cheap to clone; clones share the engine and the counters.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Rc<RegistryInner>,
}

impl ResourceRegistry {
    /// Creates a registry over an engine.
    pub fn new(engine: Rc<dyn Engine>, config: BridgeConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                engine,
                config,
                stats: RefCell::new(RegistryStats::default()),
            }),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &dyn Engine {
        self.inner.engine.as_ref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> RegistryStats {
        self.inner.stats.borrow().clone()
    }

    /// Takes ownership of a raw handle.
    pub fn register(&self, raw: RawHandle, kind: ResourceKind) -> ExternalHandle {
        self.inner.stats.borrow_mut().on_register(kind);
        tracing::trace!(handle = %raw, %kind, "registered handle");
        ExternalHandle(Rc::new(HandleInner {
            registry: self.clone(),
            raw,
            kind,
            state: Cell::new(HandleState::Live),
        }))
    }

    /// Turns a non-`Ok` status into an engine error carrying the last error
    /// message.
    pub(crate) fn check(&self, status: EngineStatus) -> BridgeResult<()> {
        if status.is_ok() {
            return Ok(());
        }
        let message = self
            .engine()
            .last_error_message()
            .unwrap_or_else(|| format!("engine call failed with status {status:?}"));
        Err(BridgeError::engine(message))
    }

    /// Registers the result of a constructor, or reports the allocation
    /// failure.
    pub(crate) fn adopt(
        &self,
        raw: Option<RawHandle>,
        kind: ResourceKind,
    ) -> BridgeResult<ExternalHandle> {
        match raw {
            Some(raw) => Ok(self.register(raw, kind)),
            None => Err(BridgeError::AllocationFailure {
                kind,
                message: self
                    .engine()
                    .last_error_message()
                    .unwrap_or_else(|| "engine returned no handle".to_string()),
            }),
        }
    }

    /// Reads the engine's error after a call that signals failure out of band.
    pub(crate) fn last_error(&self, fallback: &str) -> BridgeError {
        BridgeError::engine(
            self.engine()
                .last_error_message()
                .unwrap_or_else(|| fallback.to_string()),
        )
    }

    fn free(&self, raw: RawHandle, kind: ResourceKind) {
        let engine = self.engine();
        match kind {
            ResourceKind::Value => engine.free_value(raw),
            ResourceKind::Document => engine.free_document(raw),
            ResourceKind::Array => engine.free_array(raw),
            ResourceKind::ObjectId => engine.free_object_id(raw),
            ResourceKind::UtcDateTime => engine.free_utc_datetime(raw),
            ResourceKind::DocumentIter => engine.free_document_iter(raw),
            ResourceKind::Cursor => engine.free_cursor(raw),
            ResourceKind::Database => engine.close(raw),
        }
        self.inner.stats.borrow_mut().on_end(kind);
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("engine", &self.engine().version())
            .field("stats", &*self.inner.stats.borrow())
            .finish()
    }
}

struct HandleInner {
    registry: ResourceRegistry,
    raw: RawHandle,
    kind: ResourceKind,
    state: Cell<HandleState>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if self.state.get() != HandleState::Live {
            return;
        }
        self.state.set(HandleState::Released);
        if self.kind == ResourceKind::Database && self.registry.config().warn_on_finalized_database
        {
            tracing::warn!(handle = %self.raw, "database was not closed explicitly; closing in finalizer");
        }
        tracing::trace!(handle = %self.raw, kind = %self.kind, "finalizing handle");
        self.registry.inner.stats.borrow_mut().released_by_finalizer += 1;
        self.registry.free(self.raw, self.kind);
    }
}

/// A host-visible reference to one native resource.
///
/// Clones are additional host references to the same resource. The resource
/// is freed exactly once: by the first [`release`](Self::release), or by the
/// finalizer when the last clone is dropped.
#[derive(Clone)]
pub struct ExternalHandle(Rc<HandleInner>);

impl ExternalHandle {
    /// Kind of the wrapped resource.
    pub fn kind(&self) -> ResourceKind {
        self.0.kind
    }

    /// Current state.
    pub fn state(&self) -> HandleState {
        self.0.state.get()
    }

    /// Returns true while the handle owns its resource.
    pub fn is_live(&self) -> bool {
        self.state() == HandleState::Live
    }

    /// The registry this handle belongs to.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.0.registry
    }

    /// Returns the raw handle, or `UseAfterRelease` once the handle has ended.
    pub fn raw(&self) -> BridgeResult<RawHandle> {
        match self.state() {
            HandleState::Live => Ok(self.0.raw),
            HandleState::Released | HandleState::Transferred => {
                Err(BridgeError::UseAfterRelease { kind: self.0.kind })
            }
        }
    }

    /// Frees the resource now. Repeated calls are no-ops.
    pub fn release(&self) {
        if self.state() != HandleState::Live {
            return;
        }
        self.0.state.set(HandleState::Released);
        tracing::trace!(handle = %self.0.raw, kind = %self.0.kind, "released handle");
        self.0.registry.inner.stats.borrow_mut().released_explicitly += 1;
        self.0.registry.free(self.0.raw, self.0.kind);
    }

    /// Records that an engine call consumed the resource.
    pub(crate) fn mark_transferred(&self) {
        if self.state() != HandleState::Live {
            return;
        }
        self.0.state.set(HandleState::Transferred);
        let mut stats = self.0.registry.inner.stats.borrow_mut();
        stats.transferred += 1;
        stats.on_end(self.0.kind);
    }

    /// Returns true when both values refer to the same handle.
    pub fn ptr_eq(&self, other: &ExternalHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A reference that does not keep the handle alive.
    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            inner: Rc::downgrade(&self.0),
            kind: self.0.kind,
        }
    }
}

impl fmt::Debug for ExternalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalHandle")
            .field("kind", &self.0.kind)
            .field("raw", &self.0.raw)
            .field("state", &self.state())
            .finish()
    }
}

/// A non-owning reference to an [`ExternalHandle`].
///
/// Once every strong clone is dropped the finalizer runs and
/// [`upgrade`](Self::upgrade) returns `UseAfterRelease`.
#[derive(Clone)]
pub struct WeakHandle {
    inner: Weak<HandleInner>,
    kind: ResourceKind,
}

impl WeakHandle {
    /// Kind of the referenced resource.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns a strong handle while one still exists.
    pub fn upgrade(&self) -> BridgeResult<ExternalHandle> {
        self.inner
            .upgrade()
            .map(ExternalHandle)
            .ok_or(BridgeError::UseAfterRelease { kind: self.kind })
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("kind", &self.kind)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// A typed view of an [`ExternalHandle`].
pub trait HandleWrapper: Sized {
    /// Kind of resource this wrapper holds.
    const KIND: ResourceKind;

    /// Wraps a handle whose kind was already checked.
    #[doc(hidden)]
    fn wrap_unchecked(handle: ExternalHandle) -> Self;

    /// The wrapped handle.
    fn handle(&self) -> &ExternalHandle;

    /// Checks the handle's kind and wraps it.
    fn unwrap_from(handle: ExternalHandle) -> BridgeResult<Self> {
        if handle.kind() != Self::KIND {
            return Err(BridgeError::type_mismatch(
                Self::KIND.name(),
                handle.kind().name(),
            ));
        }
        Ok(Self::wrap_unchecked(handle))
    }

    /// Frees the resource now. Repeated calls are no-ops.
    fn release(&self) {
        self.handle().release();
    }

    /// Raw handle for an engine call.
    fn raw(&self) -> BridgeResult<RawHandle> {
        self.handle().raw()
    }
}
