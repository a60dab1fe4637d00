//! Per-node storage: own state, inheritance link, digest-tree links, watchers.

use super::ScopeId;
use crate::value::Value;
use crate::watch::WatcherList;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub(crate) struct NodeData {
    pub(crate) id: ScopeId,
    state: RefCell<BTreeMap<String, Value>>,
    /// Readable-state fallthrough; `None` for the root and isolated nodes.
    pub(crate) inheritance_parent: Option<Rc<NodeData>>,
    /// Traversal parent; `None` only for the root.
    pub(crate) digest_parent: Option<ScopeId>,
    pub(crate) children: RefCell<Vec<ScopeId>>,
    pub(crate) watchers: RefCell<WatcherList>,
    destroyed: Cell<bool>,
}

impl NodeData {
    pub(crate) fn new(
        id: ScopeId,
        inheritance_parent: Option<Rc<NodeData>>,
        digest_parent: Option<ScopeId>,
    ) -> Self {
        Self {
            id,
            state: RefCell::new(BTreeMap::new()),
            inheritance_parent,
            digest_parent,
            children: RefCell::new(Vec::new()),
            watchers: RefCell::new(WatcherList::default()),
            destroyed: Cell::new(false),
        }
    }

    /// Own state first, then each inheritance ancestor in turn.
    pub(crate) fn lookup(&self, name: &str) -> Value {
        let mut node = self;
        loop {
            if let Some(value) = node.state.borrow().get(name) {
                return value.clone();
            }
            match &node.inheritance_parent {
                Some(parent) => node = &**parent,
                None => return Value::Undefined,
            }
        }
    }

    pub(crate) fn has_own(&self, name: &str) -> bool {
        self.state.borrow().contains_key(name)
    }

    pub(crate) fn assign(&self, name: String, value: Value) -> Option<Value> {
        self.state.borrow_mut().insert(name, value)
    }

    pub(crate) fn unassign(&self, name: &str) -> Option<Value> {
        self.state.borrow_mut().remove(name)
    }

    pub(crate) fn own_keys(&self) -> Vec<String> {
        self.state.borrow().keys().cloned().collect()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }
}
