//! Integration tests for stabilization cycles

use super::test_utils::{increment, Counter};
use settle::{
    Array, DigestError, Equality, FailureSource, Phase, RecordingReporter, Scope, Value, WatchHandle,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_listener_runs_only_when_value_changes() {
    let scope = Scope::new();
    scope.set("someValue", "a");
    scope.set("counter", 0);
    scope.watch(
        |s| Ok(s.get("someValue")),
        |_, _, s| {
            increment(s, "counter");
            Ok(())
        },
    );

    assert_eq!(scope.get("counter"), Value::from(0));
    scope.digest().unwrap();
    assert_eq!(scope.get("counter"), Value::from(1));

    scope.digest().unwrap();
    assert_eq!(scope.get("counter"), Value::from(1));

    scope.set("someValue", "b");
    assert_eq!(scope.get("counter"), Value::from(1));
    scope.digest().unwrap();
    assert_eq!(scope.get("counter"), Value::from(2));
}

#[test]
fn test_watcher_without_listener_still_dirty_checks() {
    let scope = Scope::new();
    let reads = Counter::new();
    let tally = reads.clone();
    scope.watch_with(
        Box::new(move |s: &Scope| -> anyhow::Result<Value> {
            tally.bump();
            Ok(s.get("x"))
        }),
        None,
        Equality::Identity,
    );

    scope.digest().unwrap();
    assert!(reads.get() >= 1);
}

#[test]
fn test_reaction_change_is_seen_by_earlier_watcher() {
    let scope = Scope::new();
    scope.set("name", "Jane");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    scope.watch(
        |s| Ok(s.get("nameUpper")),
        move |new, _, _| {
            sink.borrow_mut().push(new.clone());
            Ok(())
        },
    );
    scope.watch(
        |s| Ok(s.get("name")),
        |new, _, s| {
            if let Some(name) = new.as_str() {
                s.set("nameUpper", name.to_uppercase());
            }
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!(seen.borrow().last(), Some(&Value::from("JANE")));
}

#[test]
fn test_short_circuit_skips_clean_tail() {
    let scope = Scope::new();
    let items: Vec<Value> = (0..100).map(Value::from).collect();
    let array = Array::from_vec(items);
    scope.set("array", array.clone());

    let reads = Counter::new();
    for index in 0..100 {
        let tally = reads.clone();
        scope.watch(
            move |s| {
                tally.bump();
                Ok(s
                    .get("array")
                    .as_array()
                    .and_then(|array| array.get(index))
                    .unwrap_or_default())
            },
            |_, _, _| Ok(()),
        );
    }

    scope.digest().unwrap();
    assert_eq!(reads.get(), 200);

    array.set(0, 420);
    scope.digest().unwrap();
    assert_eq!(reads.get(), 301);
}

#[test]
fn test_unstable_watchers_exhaust_the_budget() {
    let scope = Scope::new();
    scope.set("counterA", 0);
    scope.set("counterB", 0);
    let reads = Counter::new();

    let tally = reads.clone();
    scope.watch(
        move |s| {
            tally.bump();
            Ok(s.get("counterA"))
        },
        |_, _, s| {
            increment(s, "counterB");
            Ok(())
        },
    );
    scope.watch(
        |s| Ok(s.get("counterB")),
        |_, _, s| {
            increment(s, "counterA");
            Ok(())
        },
    );

    let result = scope.digest();
    assert!(matches!(
        result,
        Err(DigestError::StabilizationExceeded { ttl: 10 })
    ));
    assert_eq!(reads.get(), 11);
    assert_eq!(scope.phase(), Phase::None);
}

#[test]
fn test_refilling_evaluate_soon_queue_exhausts_the_budget() {
    let scope = Scope::new();
    let reads = Counter::new();
    let tally = reads.clone();
    scope.watch(
        move |s| {
            tally.bump();
            s.schedule_soon(|_| Ok(()));
            Ok(Value::from("constant"))
        },
        |_, _, _| Ok(()),
    );

    assert!(matches!(
        scope.digest(),
        Err(DigestError::StabilizationExceeded { ttl: 10 })
    ));
    assert_eq!(reads.get(), 11);
    assert_eq!(scope.phase(), Phase::None);
}

#[test]
fn test_budget_follows_configured_ttl() {
    let scope = Scope::builder().ttl(2).build();
    let reads = Counter::new();
    let tally = reads.clone();
    scope.watch(
        move |s| {
            tally.bump();
            Ok(s.get("n"))
        },
        |_, _, s| {
            increment(s, "n");
            Ok(())
        },
    );

    assert!(matches!(
        scope.digest(),
        Err(DigestError::StabilizationExceeded { ttl: 2 })
    ));
    assert_eq!(reads.get(), 3);
}

#[test]
fn test_nan_is_stable() {
    let scope = Scope::new();
    scope.set("number", f64::NAN);
    let calls = Counter::new();
    let tally = calls.clone();
    scope.watch(
        |s| Ok(s.get("number")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_in_place_mutation_needs_deep_equality() {
    let scope = Scope::new();
    let array = Array::from_vec(vec![1.into(), 2.into(), 3.into()]);
    scope.set("array", array.clone());

    let identity_calls = Counter::new();
    let deep_calls = Counter::new();
    let tally = identity_calls.clone();
    scope.watch(
        |s| Ok(s.get("array")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );
    let tally = deep_calls.clone();
    scope.watch_deep(
        |s| Ok(s.get("array")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!((identity_calls.get(), deep_calls.get()), (1, 1));

    array.push(4);
    scope.digest().unwrap();
    assert_eq!((identity_calls.get(), deep_calls.get()), (1, 2));
}

#[test]
fn test_deep_watch_old_value_is_a_copy() {
    let scope = Scope::new();
    let array = Array::from_vec(vec![1.into()]);
    scope.set("array", array.clone());
    let lengths = Rc::new(RefCell::new(Vec::new()));

    let sink = lengths.clone();
    scope.watch_deep(
        |s| Ok(s.get("array")),
        move |new, old, _| {
            let len = |v: &Value| v.as_array().map(|a| a.len()).unwrap_or_default();
            sink.borrow_mut().push((len(new), len(old)));
            Ok(())
        },
    );

    scope.digest().unwrap();
    array.push(2);
    scope.digest().unwrap();
    assert_eq!(*lengths.borrow(), vec![(1, 1), (2, 1)]);
}

#[test]
fn test_deregistered_watcher_stops_running() {
    let scope = Scope::new();
    scope.set("x", 1);
    let calls = Counter::new();
    let tally = calls.clone();
    let handle = scope.watch(
        |s| Ok(s.get("x")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    scope.digest().unwrap();
    handle.deregister();
    scope.set("x", 2);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(scope.watcher_count(), 0);
}

#[test]
fn test_watcher_can_deregister_itself_mid_pass() {
    let scope = Scope::new();
    let first = Counter::new();
    let third = Counter::new();
    let slot: Rc<RefCell<Option<WatchHandle>>> = Rc::new(RefCell::new(None));

    let tally = first.clone();
    scope.watch(
        |_| Ok(Value::from("a")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );
    let own = slot.clone();
    let handle = scope.watch(
        |_| Ok(Value::from("b")),
        move |_, _, _| {
            if let Some(handle) = own.borrow().as_ref() {
                handle.deregister();
            }
            Ok(())
        },
    );
    *slot.borrow_mut() = Some(handle);
    let tally = third.clone();
    scope.watch(
        |_| Ok(Value::from("c")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!((first.get(), third.get()), (1, 1));
    assert_eq!(scope.watcher_count(), 2);
}

#[test]
fn test_watcher_removed_by_another_does_not_run() {
    let scope = Scope::new();
    let removed_calls = Counter::new();
    let victim: Rc<RefCell<Option<WatchHandle>>> = Rc::new(RefCell::new(None));

    let target = victim.clone();
    scope.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            if let Some(handle) = target.borrow().as_ref() {
                handle.deregister();
            }
            Ok(())
        },
    );
    let tally = removed_calls.clone();
    let handle = scope.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );
    *victim.borrow_mut() = Some(handle);

    scope.digest().unwrap();
    assert_eq!(removed_calls.get(), 0);
}

#[test]
fn test_watcher_added_in_reaction_runs_in_same_cycle() {
    let scope = Scope::new();
    let nested = Counter::new();
    let added = Rc::new(std::cell::Cell::new(false));

    let tally = nested.clone();
    scope.watch(
        |_| Ok(Value::from("outer")),
        move |_, _, s| {
            if !added.replace(true) {
                let tally = tally.clone();
                s.watch(
                    |_| Ok(Value::from("inner")),
                    move |_, _, _| {
                        tally.bump();
                        Ok(())
                    },
                );
            }
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!(nested.get(), 1);
}

#[test]
fn test_failures_are_reported_and_isolated() {
    let reporter = RecordingReporter::new();
    let scope = Scope::builder().reporter(reporter.clone()).build();
    let survivor = Counter::new();

    scope.watch(|_| Err(anyhow::anyhow!("read failed")), |_, _, _| Ok(()));
    scope.watch(
        |_| Ok(Value::Null),
        |_, _, _| Err(anyhow::anyhow!("reaction failed")),
    );
    let tally = survivor.clone();
    scope.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!(survivor.get(), 1);
    assert_eq!(
        reporter.sources(),
        vec![
            FailureSource::Watch,
            FailureSource::Listener,
            FailureSource::Watch
        ]
    );
    assert_eq!(reporter.messages()[1], "reaction failed");
}

#[test]
fn test_run_with_cycle_from_descendant_digests_root() {
    let root = Scope::new();
    let grandchild = root.new_child().new_child();
    let root_calls = Counter::new();
    let tally = root_calls.clone();
    root.watch(
        |s| Ok(s.get("x")),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    let result = grandchild
        .run_with_cycle(|s| {
            s.root().set("x", 1);
            Ok(42)
        })
        .unwrap();
    assert_eq!(result, Some(42));
    assert_eq!(root_calls.get(), 1);
}

#[test]
fn test_run_with_cycle_reports_failing_expression() {
    let reporter = RecordingReporter::new();
    let scope = Scope::builder().reporter(reporter.clone()).build();
    let calls = Counter::new();
    let tally = calls.clone();
    scope.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    let result: Option<()> = scope
        .run_with_cycle(|_| Err(anyhow::anyhow!("expression failed")))
        .unwrap();
    assert!(result.is_none());
    assert_eq!(calls.get(), 1);
    assert_eq!(reporter.sources(), vec![FailureSource::Apply]);
    assert_eq!(scope.phase(), Phase::None);
}

#[test]
fn test_run_with_cycle_inside_reaction_conflicts() {
    let scope = Scope::new();
    let conflict = Rc::new(RefCell::new(None));
    let sink = conflict.clone();
    scope.watch(
        |_| Ok(Value::Null),
        move |_, _, s| {
            if let Err(DigestError::PhaseConflict { active, requested }) =
                s.run_with_cycle(|_| Ok(()))
            {
                *sink.borrow_mut() = Some((active, requested));
            }
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert_eq!(*conflict.borrow(), Some((Phase::Digest, Phase::Apply)));
}

#[test]
fn test_phase_is_apply_inside_run_with_cycle() {
    let scope = Scope::new();
    let phase = scope.run_with_cycle(|s| Ok(s.phase())).unwrap();
    assert_eq!(phase, Some(Phase::Apply));
    assert_eq!(scope.phase(), Phase::None);
}

#[test]
fn test_subtree_digest_skips_ancestors() {
    let root = Scope::new();
    let child = root.new_child();
    let root_calls = Counter::new();
    let child_calls = Counter::new();

    let tally = root_calls.clone();
    root.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );
    let tally = child_calls.clone();
    child.watch(
        |_| Ok(Value::Null),
        move |_, _, _| {
            tally.bump();
            Ok(())
        },
    );

    child.digest().unwrap();
    assert_eq!((root_calls.get(), child_calls.get()), (0, 1));

    root.digest().unwrap();
    assert_eq!((root_calls.get(), child_calls.get()), (1, 1));
}
