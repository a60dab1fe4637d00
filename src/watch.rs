//! Watcher Registry
//!
//! A watcher pairs a read function with an optional reaction. Each node keeps its
//! watchers in registration order; passes evaluate a snapshot of that sequence, so a
//! watcher deregistered mid-pass is skipped through its `active` flag and a watcher
//! registered mid-pass is first evaluated on the next pass.

mod collection;
mod group;

pub use group::GroupListenerFn;

use crate::scope::Scope;
use crate::value::{Equality, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Read function: evaluated against the owning scope on every pass
pub type ReadFn = Box<dyn Fn(&Scope) -> anyhow::Result<Value>>;

/// Reaction: `(new, old, scope)`
pub type ListenerFn = Box<dyn Fn(&Value, &Value, &Scope) -> anyhow::Result<()>>;

/// Identifier of a registered watcher, unique within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    pub(crate) fn new(id: u64) -> Self {
        WatcherId(id)
    }
}

pub(crate) struct Watcher {
    pub(crate) id: WatcherId,
    pub(crate) read: ReadFn,
    pub(crate) listener: Option<ListenerFn>,
    pub(crate) equality: Equality,
    /// `None` until the first evaluation.
    pub(crate) last: RefCell<Option<Value>>,
    active: Cell<bool>,
}

impl Watcher {
    fn new(id: WatcherId, read: ReadFn, listener: Option<ListenerFn>, equality: Equality) -> Self {
        Self {
            id,
            read,
            listener,
            equality,
            last: RefCell::new(None),
            active: Cell::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    fn deactivate(&self) {
        self.active.set(false);
    }
}

/// Watchers of one node, in registration order
#[derive(Default)]
pub(crate) struct WatcherList {
    watchers: Vec<Rc<Watcher>>,
}

impl WatcherList {
    pub(crate) fn len(&self) -> usize {
        self.watchers.len()
    }

    fn push(&mut self, watcher: Rc<Watcher>) {
        self.watchers.push(watcher);
    }

    fn remove(&mut self, id: WatcherId) {
        self.watchers.retain(|watcher| watcher.id != id);
    }

    /// Handles to every current watcher, for iteration without holding the borrow.
    pub(crate) fn snapshot(&self) -> Vec<Rc<Watcher>> {
        self.watchers.clone()
    }

    /// Drop every watcher, deactivating them first so an in-flight pass skips them.
    pub(crate) fn clear(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.deactivate();
        }
    }
}

/// Removes a registration when [`deregister`](WatchHandle::deregister) is called
///
/// Dropping the handle leaves the registration in place. Clones share the same
/// registration, so a reaction can hold a clone and deregister itself.
#[derive(Clone)]
pub struct WatchHandle {
    deregister: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl WatchHandle {
    pub(crate) fn new(deregister: impl FnOnce() + 'static) -> Self {
        let deregister: Box<dyn FnOnce()> = Box::new(deregister);
        Self {
            deregister: Rc::new(RefCell::new(Some(deregister))),
        }
    }

    /// A handle with nothing left to deregister.
    pub(crate) fn inert() -> Self {
        Self {
            deregister: Rc::new(RefCell::new(None)),
        }
    }

    /// One handle for several registrations, deregistered in order.
    pub(crate) fn all(handles: Vec<WatchHandle>) -> Self {
        Self::new(move || {
            for handle in &handles {
                handle.deregister();
            }
        })
    }

    /// Remove the registration. Calling it again is a no-op.
    pub fn deregister(&self) {
        let deregister = self.deregister.borrow_mut().take();
        if let Some(deregister) = deregister {
            deregister();
        }
    }

    pub fn is_registered(&self) -> bool {
        self.deregister.borrow().is_some()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Scope {
    /// Watch `read` and call `listener(new, old, scope)` whenever its value changes
    /// under identity comparison. The first call receives the same value as new and old.
    ///
    /// Both closures live as long as the tree. Use the `&Scope` argument, or capture
    /// a [`WeakScope`](crate::scope::WeakScope); a captured [`Scope`] keeps the tree
    /// from ever being freed.
    pub fn watch<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> anyhow::Result<Value> + 'static,
        L: Fn(&Value, &Value, &Scope) -> anyhow::Result<()> + 'static,
    {
        self.watch_with(Box::new(read), Some(Box::new(listener)), Equality::Identity)
    }

    /// Like [`watch`](Scope::watch) with structural comparison, so in-place mutation of
    /// a watched array or object counts as a change.
    pub fn watch_deep<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> anyhow::Result<Value> + 'static,
        L: Fn(&Value, &Value, &Scope) -> anyhow::Result<()> + 'static,
    {
        self.watch_with(Box::new(read), Some(Box::new(listener)), Equality::Deep)
    }

    /// Register a watcher. Without a listener it still takes part in dirty-checking.
    pub fn watch_with(
        &self,
        read: ReadFn,
        listener: Option<ListenerFn>,
        equality: Equality,
    ) -> WatchHandle {
        if self.is_destroyed() {
            return WatchHandle::inert();
        }
        let watcher = Rc::new(Watcher::new(
            self.tree.next_watcher_id(),
            read,
            listener,
            equality,
        ));
        let id = watcher.id;
        self.node.watchers.borrow_mut().push(watcher.clone());
        // A watcher added from a reaction must be reached before the pass short-circuits.
        self.tree.last_dirty.set(None);

        let tree = Rc::downgrade(&self.tree);
        let node = Rc::downgrade(&self.node);
        let watcher = Rc::downgrade(&watcher);
        WatchHandle::new(move || {
            if let Some(watcher) = watcher.upgrade() {
                watcher.deactivate();
            }
            if let Some(node) = node.upgrade() {
                node.watchers.borrow_mut().remove(id);
            }
            if let Some(tree) = tree.upgrade() {
                tree.last_dirty.set(None);
            }
        })
    }
}
