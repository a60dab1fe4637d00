//! State shared by every node of one scope tree.

use super::node::NodeData;
use super::ScopeId;
use crate::config::DigestConfig;
use crate::digest::Phase;
use crate::queue::QueueSet;
use crate::report::{ErrorReporter, FailureSource, TaskFailure};
use crate::scheduler::Scheduler;
use crate::watch::WatcherId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) struct Tree {
    pub(crate) root: Rc<NodeData>,
    /// Nodes reachable by traversal, keyed by id. Destroyed nodes are removed.
    nodes: RefCell<HashMap<ScopeId, Rc<NodeData>>>,
    pub(crate) queues: QueueSet,
    pub(crate) phase: Cell<Phase>,
    /// Last watcher seen dirty anywhere in the tree; drives the pass short-circuit.
    pub(crate) last_dirty: Cell<Option<WatcherId>>,
    pub(crate) config: DigestConfig,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    reporter: Rc<dyn ErrorReporter>,
    next_scope_id: Cell<u64>,
    next_watcher_id: Cell<u64>,
}

impl Tree {
    pub(crate) fn new(
        config: DigestConfig,
        scheduler: Rc<dyn Scheduler>,
        reporter: Rc<dyn ErrorReporter>,
    ) -> Self {
        let root = Rc::new(NodeData::new(ScopeId::ROOT, None, None));
        let mut nodes = HashMap::new();
        nodes.insert(ScopeId::ROOT, root.clone());
        Self {
            root,
            nodes: RefCell::new(nodes),
            queues: QueueSet::default(),
            phase: Cell::new(Phase::None),
            last_dirty: Cell::new(None),
            config,
            scheduler,
            reporter,
            next_scope_id: Cell::new(ScopeId::ROOT.as_u64() + 1),
            next_watcher_id: Cell::new(0),
        }
    }

    pub(crate) fn next_scope_id(&self) -> ScopeId {
        let id = self.next_scope_id.get();
        self.next_scope_id.set(id + 1);
        ScopeId::new(id)
    }

    pub(crate) fn next_watcher_id(&self) -> WatcherId {
        let id = self.next_watcher_id.get();
        self.next_watcher_id.set(id + 1);
        WatcherId::new(id)
    }

    pub(crate) fn node(&self, id: ScopeId) -> Option<Rc<NodeData>> {
        self.nodes.borrow().get(&id).cloned()
    }

    pub(crate) fn attach(&self, node: Rc<NodeData>) {
        self.nodes.borrow_mut().insert(node.id, node);
    }

    pub(crate) fn detach(&self, id: ScopeId) -> Option<Rc<NodeData>> {
        self.nodes.borrow_mut().remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub(crate) fn report(&self, source: FailureSource, scope: ScopeId, error: anyhow::Error) {
        self.reporter.report(TaskFailure {
            source,
            scope,
            error,
        });
    }
}
