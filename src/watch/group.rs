//! Group watch: one listener over several read functions.

use super::{ReadFn, WatchHandle};
use crate::scope::Scope;
use crate::value::{same_value, Equality, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Group reaction: `(new_values, old_values, scope)`, indexed like the read functions
pub type GroupListenerFn = Rc<dyn Fn(&[Value], &[Value], &Scope) -> anyhow::Result<()>>;

struct GroupState {
    new_values: Vec<Value>,
    old_values: Vec<Value>,
    reaction_scheduled: bool,
    fired: bool,
}

impl GroupState {
    fn new(len: usize) -> Self {
        Self {
            new_values: vec![Value::Undefined; len],
            old_values: vec![Value::Undefined; len],
            reaction_scheduled: false,
            fired: false,
        }
    }
}

impl Scope {
    /// Watch several read functions with one listener.
    ///
    /// Changes within a cycle are batched: the first member to change schedules a
    /// single evaluate-soon reaction carrying every member's latest new and old value.
    /// The first reaction receives the new values as old. An empty group reacts once,
    /// asynchronously, unless deregistered first. A single-member group reacts
    /// synchronously from its watcher.
    pub fn watch_group<L>(&self, reads: Vec<ReadFn>, listener: L) -> WatchHandle
    where
        L: Fn(&[Value], &[Value], &Scope) -> anyhow::Result<()> + 'static,
    {
        let listener: GroupListenerFn = Rc::new(listener);
        let mut reads = reads;
        match reads.len() {
            0 => self.watch_empty_group(listener),
            1 => match reads.pop() {
                Some(read) => self.watch_single_group(read, listener),
                None => WatchHandle::inert(),
            },
            len => {
                let state = Rc::new(RefCell::new(GroupState::new(len)));
                let handles = reads
                    .into_iter()
                    .enumerate()
                    .map(|(index, read)| self.watch_group_member(index, read, &state, &listener))
                    .collect();
                WatchHandle::all(handles)
            }
        }
    }

    fn watch_empty_group(&self, listener: GroupListenerFn) -> WatchHandle {
        let should_call = Rc::new(Cell::new(true));
        let armed = should_call.clone();
        self.schedule_soon(move |scope| {
            if armed.get() {
                listener(&[], &[], scope)?;
            }
            Ok(())
        });
        WatchHandle::new(move || should_call.set(false))
    }

    fn watch_single_group(&self, read: ReadFn, listener: GroupListenerFn) -> WatchHandle {
        let action = move |value: &Value, old: &Value, scope: &Scope| {
            let new_values = [value.clone()];
            if same_value(value, old) {
                listener(&new_values, &new_values, scope)
            } else {
                listener(&new_values, &[old.clone()], scope)
            }
        };
        self.watch_with(read, Some(Box::new(action)), Equality::Identity)
    }

    fn watch_group_member(
        &self,
        index: usize,
        read: ReadFn,
        state: &Rc<RefCell<GroupState>>,
        listener: &GroupListenerFn,
    ) -> WatchHandle {
        let state = state.clone();
        let listener = listener.clone();
        let action = move |value: &Value, old: &Value, scope: &Scope| -> anyhow::Result<()> {
            let schedule = {
                let mut group = state.borrow_mut();
                group.new_values[index] = value.clone();
                group.old_values[index] = old.clone();
                !std::mem::replace(&mut group.reaction_scheduled, true)
            };
            if schedule {
                let state = state.clone();
                let listener = listener.clone();
                scope.schedule_soon(move |scope| {
                    let (new_values, old_values, first) = {
                        let mut group = state.borrow_mut();
                        group.reaction_scheduled = false;
                        let first = !std::mem::replace(&mut group.fired, true);
                        (group.new_values.clone(), group.old_values.clone(), first)
                    };
                    if first {
                        listener(&new_values, &new_values, scope)
                    } else {
                        listener(&new_values, &old_values, scope)
                    }
                });
            }
            Ok(())
        };
        self.watch_with(read, Some(Box::new(action)), Equality::Identity)
    }
}
