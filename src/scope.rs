//! Scope Tree
//!
//! A [`Scope`] is a handle to one node of a scope tree. Nodes own readable/writable
//! state and a watcher sequence, and are linked two ways:
//!
//! - the *inheritance* link: reads of names a node does not define fall through to
//!   its inheritance parent, live and without copying;
//! - the *digest* link: traversal order for stabilization passes.
//!
//! Ordinary children use their creator for both. Isolated children have no
//! inheritance link at all, and any child may be attached for traversal under a node
//! other than its creator. Every node of a tree shares one set of deferred-work queues,
//! one phase guard and one short-circuit marker.

mod builder;
pub(crate) mod node;
pub(crate) mod tree;

pub use builder::ScopeBuilder;

use crate::digest::Phase;
use crate::error::DigestError;
use crate::value::Value;
use node::NodeData;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;
use tree::Tree;

/// Identifier of a node, unique within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn new(id: u64) -> Self {
        ScopeId(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Handle to a node of a scope tree
///
/// Cloning the handle does not copy the node. A handle keeps the whole tree alive,
/// so read functions and callbacks registered on the tree should use the `&Scope`
/// they are given, or capture a [`WeakScope`], rather than a clone.
#[derive(Clone)]
pub struct Scope {
    pub(crate) tree: Rc<Tree>,
    pub(crate) node: Rc<NodeData>,
}

/// Non-owning handle to a node, safe to capture in watchers and tasks
#[derive(Clone)]
pub struct WeakScope {
    tree: Weak<Tree>,
    node: Weak<NodeData>,
}

impl WeakScope {
    /// The node's handle, or `None` once its tree has been dropped.
    pub fn upgrade(&self) -> Option<Scope> {
        Some(Scope::from_parts(self.tree.upgrade()?, self.node.upgrade()?))
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Root of a new tree with the default configuration, a [`ManualScheduler`]
    /// nobody else can drive, and a [`TracingReporter`].
    ///
    /// [`ManualScheduler`]: crate::scheduler::ManualScheduler
    /// [`TracingReporter`]: crate::report::TracingReporter
    pub fn new() -> Self {
        ScopeBuilder::new().build()
    }

    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::new()
    }

    pub(crate) fn from_parts(tree: Rc<Tree>, node: Rc<NodeData>) -> Self {
        Self { tree, node }
    }

    pub(crate) fn root_of(tree: Rc<Tree>) -> Self {
        let node = tree.root.clone();
        Self { tree, node }
    }

    pub fn id(&self) -> ScopeId {
        self.node.id
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            tree: Rc::downgrade(&self.tree),
            node: Rc::downgrade(&self.node),
        }
    }

    pub fn root(&self) -> Scope {
        Scope::root_of(self.tree.clone())
    }

    pub fn is_root(&self) -> bool {
        Rc::ptr_eq(&self.node, &self.tree.root)
    }

    /// Inheritance parent, if any.
    pub fn parent(&self) -> Option<Scope> {
        self.node
            .inheritance_parent
            .as_ref()
            .map(|parent| Scope::from_parts(self.tree.clone(), parent.clone()))
    }

    /// Traversal parent, if still attached.
    pub fn digest_parent(&self) -> Option<Scope> {
        self.node
            .digest_parent
            .and_then(|id| self.tree.node(id))
            .map(|parent| Scope::from_parts(self.tree.clone(), parent))
    }

    /// Traversal children in attachment order.
    pub fn children(&self) -> Vec<Scope> {
        self.node
            .children
            .borrow()
            .iter()
            .filter_map(|id| self.tree.node(*id))
            .map(|child| Scope::from_parts(self.tree.clone(), child))
            .collect()
    }

    pub fn is_destroyed(&self) -> bool {
        self.node.is_destroyed()
    }

    /// Phase currently active on this tree.
    pub fn phase(&self) -> Phase {
        self.tree.phase.get()
    }

    /// True when both handles belong to the same tree.
    pub fn same_tree(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }

    /// Read `name` from own state, falling through the inheritance chain.
    /// `Undefined` when no node on the chain defines it.
    pub fn get(&self, name: &str) -> Value {
        self.node.lookup(name)
    }

    /// Write `name` into this node's own state. Never touches the parent.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.node.assign(name.into(), value.into());
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.node.has_own(name)
    }

    /// Remove `name` from own state; reads fall through to the parent again.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.node.unassign(name)
    }

    pub fn own_keys(&self) -> Vec<String> {
        self.node.own_keys()
    }

    /// Ordinary child: inherits readable state and is digested under this node.
    pub fn new_child(&self) -> Scope {
        self.spawn_child(false, self)
    }

    /// Isolated child: starts with no readable state of its own to fall through to,
    /// but shares this tree's queues and is digested under this node.
    pub fn new_isolated_child(&self) -> Scope {
        self.spawn_child(true, self)
    }

    /// Create a child of this node.
    ///
    /// `digest_parent` attaches the child for traversal under another node of the same
    /// tree while it keeps inheriting (unless `isolated`) from this node.
    pub fn create_child(
        &self,
        isolated: bool,
        digest_parent: Option<&Scope>,
    ) -> Result<Scope, DigestError> {
        let attach = digest_parent.unwrap_or(self);
        if !self.same_tree(attach) {
            return Err(DigestError::ForeignScope);
        }
        Ok(self.spawn_child(isolated, attach))
    }

    fn spawn_child(&self, isolated: bool, attach: &Scope) -> Scope {
        let id = self.tree.next_scope_id();
        let inheritance = (!isolated).then(|| self.node.clone());
        let node = Rc::new(NodeData::new(id, inheritance, Some(attach.id())));

        if attach.is_destroyed() {
            node.mark_destroyed();
        } else {
            attach.node.children.borrow_mut().push(id);
            self.tree.attach(node.clone());
        }
        debug!(scope = %id, parent = %attach.id(), isolated, "Created child scope");
        Scope::from_parts(self.tree.clone(), node)
    }

    /// Detach this node from traversal and disable it and all of its descendants.
    ///
    /// Watchers are discarded and later operations on the disabled nodes are inert.
    /// Readable state stays readable.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        if let Some(parent) = self.node.digest_parent.and_then(|id| self.tree.node(id)) {
            parent.children.borrow_mut().retain(|child| *child != self.id());
        }

        let mut disabled = 0usize;
        let mut stack = vec![self.node.clone()];
        while let Some(node) = stack.pop() {
            self.tree.detach(node.id);
            node.mark_destroyed();
            node.watchers.borrow_mut().clear();
            let children: Vec<ScopeId> = node.children.borrow_mut().drain(..).collect();
            stack.extend(children.into_iter().filter_map(|id| self.tree.node(id)));
            disabled += 1;
        }
        self.tree.last_dirty.set(None);
        debug!(scope = %self.id(), disabled, "Destroyed scope");
    }

    /// Number of watchers registered directly on this node.
    pub fn watcher_count(&self) -> usize {
        self.node.watchers.borrow().len()
    }

    /// Number of live (not destroyed) nodes in this tree.
    pub fn tree_size(&self) -> usize {
        self.tree.len()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("destroyed", &self.is_destroyed())
            .field("keys", &self.own_keys())
            .finish()
    }
}
