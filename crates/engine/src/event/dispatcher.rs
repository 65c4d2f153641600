//! Synchronous publish/subscribe for world-change events.
//!
//! Design contract with the tick thread:
//!   • Dispatch takes a read lock only long enough to clone an `Arc` of the
//!     kind's handler list, then invokes handlers with no lock held. A
//!     handler may register or unregister (even itself) without deadlocking.
//!   • Registration and revocation may come from any thread. They rebuild
//!     the affected list and swap it in (copy-on-write), so a dispatch in
//!     progress keeps iterating the snapshot it started with.
//!   • Mutations are serialized by the registry mutex; lock order is always
//!     registry, then list.
//!
//! Every registration is O(n) in the size of the kind's list.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use slotmap::{SlotMap, new_key_type};

use super::stats::{DispatchStats, DispatchStatsSnapshot};
use super::{
    BlockChanged, EventKind, ItemAdded, ItemMoved, ItemRemoved, Payload, QuantityChanged,
    WorldEvent,
};

new_key_type! {
    /// Handle for a single registered handler.
    pub struct HandlerId;
}

/// Opaque identity under which registrations are grouped for bulk
/// revocation via [`Dispatcher::unregister_all`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(u64);

impl OwnerToken {
    /// A token chosen by the registering scope. Callers mixing these with
    /// [`Dispatcher::new_owner`] must keep the raw values disjoint.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

type Handler = Arc<dyn Fn(&WorldEvent) + Send + Sync>;

struct HandlerEntry {
    id: HandlerId,
    owner: OwnerToken,
    label: &'static str,
    handler: Handler,
}

type HandlerList = Arc<Vec<Arc<HandlerEntry>>>;

#[derive(Clone, Copy)]
struct Registration {
    owner: OwnerToken,
    kind: EventKind,
}

#[derive(Default)]
struct Registry {
    entries: SlotMap<HandlerId, Registration>,
    owners: HashMap<OwnerToken, Vec<HandlerId>>,
}

/// Result of one [`Dispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Handlers attempted.
    pub invoked: usize,
    /// Handlers that panicked.
    pub faulted: usize,
}

/// A record of optional per-kind callbacks registered as one unit.
///
/// Absent callbacks register nothing, so a listener that only cares about
/// `Moved` does not make [`Dispatcher::has_handlers`] true for other kinds.
pub struct Listener {
    label: &'static str,
    callbacks: [Option<Handler>; 5],
}

impl Listener {
    pub fn new() -> Self {
        Self::named("listener")
    }

    /// A listener whose name appears in fault logs.
    pub fn named(label: &'static str) -> Self {
        Self {
            label,
            callbacks: Default::default(),
        }
    }

    pub fn on_added(self, f: impl Fn(&ItemAdded) + Send + Sync + 'static) -> Self {
        self.with::<ItemAdded>(f)
    }

    pub fn on_removed(self, f: impl Fn(&ItemRemoved) + Send + Sync + 'static) -> Self {
        self.with::<ItemRemoved>(f)
    }

    pub fn on_moved(self, f: impl Fn(&ItemMoved) + Send + Sync + 'static) -> Self {
        self.with::<ItemMoved>(f)
    }

    pub fn on_quantity_changed(self, f: impl Fn(&QuantityChanged) + Send + Sync + 'static) -> Self {
        self.with::<QuantityChanged>(f)
    }

    pub fn on_block_changed(self, f: impl Fn(&BlockChanged) + Send + Sync + 'static) -> Self {
        self.with::<BlockChanged>(f)
    }

    fn with<E: Payload>(mut self, f: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.callbacks[E::KIND.index()] = Some(typed(f));
        self
    }

    /// Kinds this listener has a callback for.
    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|k| self.callbacks[k.index()].is_some())
            .collect()
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

fn typed<E: Payload>(f: impl Fn(&E) + Send + Sync + 'static) -> Handler {
    Arc::new(move |event: &WorldEvent| {
        if let Some(payload) = E::from_event(event) {
            f(payload);
        }
    })
}

/// Per-world event registry and fan-out.
pub struct Dispatcher {
    lists: [RwLock<HandlerList>; 5],
    registry: Mutex<Registry>,
    next_owner: AtomicU64,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            lists: Default::default(),
            registry: Mutex::new(Registry::default()),
            next_owner: AtomicU64::new(1),
            stats: DispatchStats::new(),
        }
    }

    /// Mint a fresh owner token, unique within this dispatcher.
    pub fn new_owner(&self) -> OwnerToken {
        OwnerToken(self.next_owner.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a handler for every event of `kind`.
    pub fn register<F>(&self, owner: OwnerToken, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&WorldEvent) + Send + Sync + 'static,
    {
        self.insert(owner, kind, std::any::type_name::<F>(), Arc::new(handler))
    }

    /// Register a handler for one concrete payload type.
    pub fn on<E, F>(&self, owner: OwnerToken, handler: F) -> HandlerId
    where
        E: Payload,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(owner, E::KIND, std::any::type_name::<F>(), typed(handler))
    }

    /// Register every callback the listener carries, in kind order.
    pub fn register_listener(&self, owner: OwnerToken, listener: Listener) -> Vec<HandlerId> {
        let label = listener.label;
        EventKind::ALL
            .into_iter()
            .zip(listener.callbacks)
            .filter_map(|(kind, callback)| callback.map(|h| self.insert(owner, kind, label, h)))
            .collect()
    }

    fn insert(&self, owner: OwnerToken, kind: EventKind, label: &'static str, handler: Handler) -> HandlerId {
        let mut registry = self.registry.lock().expect("dispatcher registry poisoned");
        let id = registry.entries.insert(Registration { owner, kind });
        registry.owners.entry(owner).or_default().push(id);

        let entry = Arc::new(HandlerEntry {
            id,
            owner,
            label,
            handler,
        });
        let mut list = self.lists[kind.index()].write().expect("handler list poisoned");
        let mut next = Vec::with_capacity(list.len() + 1);
        next.extend(list.iter().cloned());
        next.push(entry);
        *list = Arc::new(next);
        id
    }

    /// Remove a single handler. Returns `false` if it was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut registry = self.registry.lock().expect("dispatcher registry poisoned");
        let Some(registration) = registry.entries.remove(id) else {
            return false;
        };
        let now_empty = match registry.owners.get_mut(&registration.owner) {
            Some(owned) => {
                owned.retain(|h| *h != id);
                owned.is_empty()
            }
            None => false,
        };
        if now_empty {
            registry.owners.remove(&registration.owner);
        }
        self.rebuild(registration.kind, |entry| entry.id != id);
        true
    }

    /// Remove every handler registered under `owner`, across all kinds.
    /// Returns how many were removed; an unknown owner is a no-op.
    ///
    /// A handler already executing is not interrupted.
    pub fn unregister_all(&self, owner: OwnerToken) -> usize {
        let mut registry = self.registry.lock().expect("dispatcher registry poisoned");
        let Some(owned) = registry.owners.remove(&owner) else {
            return 0;
        };

        let mut touched = [false; 5];
        for id in &owned {
            if let Some(registration) = registry.entries.remove(*id) {
                touched[registration.kind.index()] = true;
            }
        }
        for kind in EventKind::ALL {
            if touched[kind.index()] {
                self.rebuild(kind, |entry| entry.owner != owner);
            }
        }
        owned.len()
    }

    /// Swap in a filtered copy of one kind's list. Caller holds the registry lock.
    fn rebuild(&self, kind: EventKind, keep: impl Fn(&HandlerEntry) -> bool) {
        let mut list = self.lists[kind.index()].write().expect("handler list poisoned");
        let next: Vec<_> = list.iter().filter(|e| keep(e)).cloned().collect();
        *list = Arc::new(next);
    }

    /// Whether anything is registered for `kind`. Emitters check this before
    /// doing any work.
    pub fn has_handlers(&self, kind: EventKind) -> bool {
        !self.lists[kind.index()]
            .read()
            .expect("handler list poisoned")
            .is_empty()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lists[kind.index()].read().expect("handler list poisoned").len()
    }

    /// Number of owners with at least one live registration.
    pub fn owner_count(&self) -> usize {
        self.registry
            .lock()
            .expect("dispatcher registry poisoned")
            .owners
            .len()
    }

    /// Invoke every handler registered for the event's kind, in registration
    /// order, against a snapshot of the list taken on entry.
    ///
    /// A panicking handler is logged and skipped; the remaining handlers
    /// still run and nothing propagates to the caller.
    pub fn dispatch(&self, event: &WorldEvent) -> DispatchOutcome {
        let kind = event.kind();
        let snapshot: HandlerList = Arc::clone(&*self.lists[kind.index()].read().expect("handler list poisoned"));

        let mut outcome = DispatchOutcome::default();
        for entry in snapshot.iter() {
            outcome.invoked += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(event)));
            if let Err(cause) = result {
                outcome.faulted += 1;
                tracing::warn!(
                    "Handler '{}' ({:?}) panicked on {} event: {}",
                    entry.label,
                    entry.owner,
                    kind.name(),
                    panic_message(cause.as_ref())
                );
            }
        }

        self.stats
            .record(kind, outcome.invoked as u64, outcome.faulted as u64);
        outcome
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Drop every registration (world teardown).
    pub fn clear(&self) {
        let mut registry = self.registry.lock().expect("dispatcher registry poisoned");
        *registry = Registry::default();
        for list in &self.lists {
            *list.write().expect("handler list poisoned") = Arc::new(Vec::new());
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
