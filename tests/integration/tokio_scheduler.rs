//! Integration tests for the tokio-backed scheduler

use super::test_utils::Counter;
use settle::{Scope, TokioScheduler, Value};
use tokio::task::LocalSet;

async fn settle_tasks(scheduler: &TokioScheduler) {
    for _ in 0..16 {
        if scheduler.pending() == 0 {
            return;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_schedule_soon_triggers_digest_on_local_set() {
    LocalSet::new()
        .run_until(async {
            let scheduler = TokioScheduler::new();
            let scope = Scope::builder().scheduler(scheduler.clone()).build();
            let calls = Counter::new();
            let tally = calls.clone();
            scope.watch(
                |s| Ok(s.get("x")),
                move |_, _, _| {
                    tally.bump();
                    Ok(())
                },
            );

            scope.schedule_soon(|s| {
                s.set("x", 1);
                Ok(())
            });
            assert_eq!(calls.get(), 0);

            settle_tasks(&scheduler).await;
            assert_eq!(scheduler.pending(), 0);
            assert_eq!(calls.get(), 1);
            assert_eq!(scope.get("x"), Value::from(1));
        })
        .await;
}

#[tokio::test]
async fn test_digest_cancels_scheduled_flush() {
    LocalSet::new()
        .run_until(async {
            let scheduler = TokioScheduler::new();
            let scope = Scope::builder().scheduler(scheduler.clone()).build();

            scope.schedule_coalesced(|s| {
                s.set("flushed", true);
                Ok(())
            });
            assert_eq!(scheduler.pending(), 1);

            scope.digest().unwrap();
            assert_eq!(scheduler.pending(), 0);
            assert_eq!(scope.get("flushed"), Value::from(true));

            settle_tasks(&scheduler).await;
            assert!(!scope.has_pending_flush());
        })
        .await;
}
