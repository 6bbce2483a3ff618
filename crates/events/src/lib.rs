//! Scoped ownership of host event subscriptions.
//! 以範圍（scope）管理主機事件訂閱的生命週期。
//!
//! Every binding belongs to a [`Scope`]: one command instance or one dialog
//! session. The registry keeps the only strong reference to each callback and
//! hands the host a weak one, so a callback lives exactly as long as its scope.
//! Releasing a scope unsubscribes every binding in it; dropping the registry
//! releases whatever is left.
//! 每個綁定都隸屬於一個範圍（命令實例或對話框工作階段）。登錄表持有回呼唯一的強參照，
//! 主機僅取得弱參照，因此回呼的存活時間與其範圍一致。

use cambench_host::{Callback, EventHost, EventSource, HostError, HostEvent, SubscriptionHandle};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one installed command instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Identifier of one interactive session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Lifetime boundary for a set of bindings.
/// 一組綁定共同的生命週期邊界。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Instance(InstanceId),
    Session(SessionId),
}

impl From<InstanceId> for Scope {
    fn from(id: InstanceId) -> Self {
        Scope::Instance(id)
    }
}

impl From<SessionId> for Scope {
    fn from(id: SessionId) -> Self {
        Scope::Session(id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Instance(id) => id.fmt(f),
            Scope::Session(id) => id.fmt(f),
        }
    }
}

/// Opaque id of one binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{scope} already has a handler for {event}")]
    DuplicateBinding { scope: Scope, event: EventSource },
    #[error("host rejected subscription to {event}: {error}")]
    Subscribe {
        event: EventSource,
        #[source]
        error: HostError,
    },
}

struct Binding {
    id: BindingId,
    event: EventSource,
    handle: SubscriptionHandle,
    // Sole strong reference; the host only holds a `Weak`.
    _callback: Callback,
}

/// Per-scope collection of live subscriptions.
/// 依範圍分組的有效訂閱集合。
pub struct HandlerRegistry<H: EventHost + ?Sized> {
    host: Rc<H>,
    scopes: BTreeMap<Scope, Vec<Binding>>,
    next_binding: u64,
}

impl<H: EventHost + ?Sized> HandlerRegistry<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            scopes: BTreeMap::new(),
            next_binding: 0,
        }
    }

    /// Subscribes `callback` to `event` under `scope`. Each (scope, event)
    /// pair holds at most one binding.
    /// 在 `scope` 下訂閱 `event`；每個（範圍, 事件）組合最多一個綁定。
    pub fn subscribe<F>(
        &mut self,
        scope: Scope,
        event: EventSource,
        callback: F,
    ) -> Result<BindingId, RegistryError>
    where
        F: Fn(&mut HostEvent) + 'static,
    {
        let duplicate = self
            .scopes
            .get(&scope)
            .is_some_and(|bindings| bindings.iter().any(|binding| binding.event == event));
        if duplicate {
            return Err(RegistryError::DuplicateBinding { scope, event });
        }

        let callback: Callback = Rc::new(callback);
        let handle = self
            .host
            .subscribe(&event, Rc::downgrade(&callback))
            .map_err(|error| RegistryError::Subscribe {
                event: event.clone(),
                error,
            })?;

        self.next_binding += 1;
        let id = BindingId(self.next_binding);
        debug!(%scope, %event, %handle, "handler bound");
        self.scopes.entry(scope).or_default().push(Binding {
            id,
            event,
            handle,
            _callback: callback,
        });
        Ok(id)
    }

    /// Unsubscribes and drops every binding of `scope`, returning how many were
    /// released. Calling it again is a no-op returning zero. Safe to call from a
    /// handler bound under `scope`: the host keeps that handler alive until it
    /// returns.
    /// 解除並釋放 `scope` 的所有綁定；重複呼叫不會出錯。可於該範圍的處理常式中呼叫。
    pub fn release_scope(&mut self, scope: Scope) -> usize {
        let Some(bindings) = self.scopes.remove(&scope) else {
            return 0;
        };
        let released = bindings.len();
        for binding in bindings {
            // Even when the host fails to unsubscribe, dropping the binding
            // drops the last strong reference, so the callback cannot fire.
            if let Err(err) = self.host.unsubscribe(binding.handle) {
                warn!(%scope, event = %binding.event, error = %err, "unsubscribe failed");
            }
        }
        debug!(%scope, released, "scope released");
        released
    }

    /// Releases every scope.
    pub fn release_all(&mut self) -> usize {
        let scopes: Vec<Scope> = self.scopes.keys().copied().collect();
        scopes
            .into_iter()
            .map(|scope| self.release_scope(scope))
            .sum()
    }

    pub fn live_bindings(&self, scope: Scope) -> usize {
        self.scopes.get(&scope).map_or(0, Vec::len)
    }

    pub fn is_live(&self, binding: BindingId) -> bool {
        self.scopes
            .values()
            .flatten()
            .any(|candidate| candidate.id == binding)
    }

    pub fn total_bindings(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }
}

impl<H: EventHost + ?Sized> Drop for HandlerRegistry<H> {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            debug!(released, "registry dropped with live bindings");
        }
    }
}
