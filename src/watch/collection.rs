//! Collection watch: shallow, incremental change detection for arrays and objects.
//!
//! Instead of deep-comparing the whole value, the read side keeps a one-level shadow
//! of the last seen collection and bumps a change counter for every difference it
//! finds. The underlying watcher watches that counter.

use super::WatchHandle;
use crate::scope::Scope;
use crate::value::{same_value, Equality, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Last seen shape of the watched value
#[derive(Default)]
enum Shadow {
    #[default]
    Unset,
    Scalar(Value),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

#[derive(Default)]
struct CollectionTracker {
    shadow: Shadow,
    changes: u64,
    /// Live value from the latest read.
    current: Value,
    /// Copy taken after the previous reaction, when the listener wants old values.
    previous: Option<Value>,
    fired: bool,
}

impl CollectionTracker {
    /// Update the shadow from `value`; returns the running change count.
    fn detect(&mut self, value: &Value) -> u64 {
        match value {
            Value::Array(array) => {
                let items = array.to_vec();
                if !matches!(self.shadow, Shadow::List(_)) {
                    self.shadow = Shadow::List(Vec::new());
                    self.changes += 1;
                }
                if let Shadow::List(shadow) = &mut self.shadow {
                    if shadow.len() != items.len() {
                        self.changes += 1;
                        shadow.resize(items.len(), Value::Undefined);
                    }
                    for (slot, item) in shadow.iter_mut().zip(items) {
                        if !same_value(slot, &item) {
                            self.changes += 1;
                            *slot = item;
                        }
                    }
                }
            }
            Value::Object(object) => {
                let entries = object.entries();
                if !matches!(self.shadow, Shadow::Map(_)) {
                    self.shadow = Shadow::Map(BTreeMap::new());
                    self.changes += 1;
                }
                if let Shadow::Map(shadow) = &mut self.shadow {
                    for (key, item) in &entries {
                        match shadow.get_mut(key) {
                            Some(slot) => {
                                if !same_value(slot, item) {
                                    self.changes += 1;
                                    *slot = item.clone();
                                }
                            }
                            None => {
                                self.changes += 1;
                                shadow.insert(key.clone(), item.clone());
                            }
                        }
                    }
                    if shadow.len() > entries.len() {
                        self.changes += 1;
                        shadow.retain(|key, _| object.contains_key(key));
                    }
                }
            }
            scalar => {
                let unchanged = matches!(&self.shadow, Shadow::Scalar(last) if same_value(last, scalar));
                if !unchanged {
                    self.shadow = Shadow::Scalar(scalar.clone());
                    self.changes += 1;
                }
            }
        }
        self.changes
    }

    /// Values to hand the listener: the live value, and either the same value on the
    /// first firing or the copy retained from the previous one.
    fn reaction_values(&mut self) -> (Value, Value) {
        let current = self.current.clone();
        let old = if self.fired {
            self.previous.clone().unwrap_or_else(|| current.clone())
        } else {
            self.fired = true;
            current.clone()
        };
        (current, old)
    }
}

impl Scope {
    /// Watch an array or object shallowly: element or entry additions, removals and
    /// replacements each count as a change, without deep-comparing nested values.
    ///
    /// The listener gets the live value as new and, as old, the same value on the
    /// first call and afterwards a copy taken after the previous call.
    pub fn watch_collection<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> anyhow::Result<Value> + 'static,
        L: Fn(&Value, &Value, &Scope) -> anyhow::Result<()> + 'static,
    {
        self.collection_watch(read, CollectionListener::WithOld(Box::new(listener)))
    }

    /// [`watch_collection`](Scope::watch_collection) for listeners that only need the
    /// current value; skips copying the collection after every change.
    pub fn watch_collection_current<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> anyhow::Result<Value> + 'static,
        L: Fn(&Value, &Scope) -> anyhow::Result<()> + 'static,
    {
        self.collection_watch(read, CollectionListener::CurrentOnly(Box::new(listener)))
    }

    fn collection_watch<R>(&self, read: R, listener: CollectionListener) -> WatchHandle
    where
        R: Fn(&Scope) -> anyhow::Result<Value> + 'static,
    {
        let tracker = Rc::new(RefCell::new(CollectionTracker::default()));

        let detector = tracker.clone();
        let counter = move |scope: &Scope| -> anyhow::Result<Value> {
            let value = read(scope)?;
            let mut tracker = detector.borrow_mut();
            let changes = tracker.detect(&value);
            tracker.current = value;
            Ok(Value::Number(changes as f64))
        };

        let action = move |_: &Value, _: &Value, scope: &Scope| -> anyhow::Result<()> {
            let (current, old) = tracker.borrow_mut().reaction_values();
            match &listener {
                CollectionListener::WithOld(listener) => {
                    listener(&current, &old, scope)?;
                    tracker.borrow_mut().previous = Some(current.deep_copy());
                }
                CollectionListener::CurrentOnly(listener) => listener(&current, scope)?,
            }
            Ok(())
        };

        self.watch_with(Box::new(counter), Some(Box::new(action)), Equality::Identity)
    }
}

enum CollectionListener {
    WithOld(Box<dyn Fn(&Value, &Value, &Scope) -> anyhow::Result<()>>),
    CurrentOnly(Box<dyn Fn(&Value, &Scope) -> anyhow::Result<()>>),
}
