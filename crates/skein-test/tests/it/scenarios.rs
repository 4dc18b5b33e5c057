//! The end-to-end scenarios from the scheduler's design notes, driven over
//! the real wire protocol rather than in-process — `skein-core`'s own test
//! module already exercises these scenarios against the bare `Scheduler`;
//! this suite exists to prove the server/client/transport seam preserves
//! the same semantics end to end.

use skein_core::{Config, Sid};

async fn server() -> skein_test::ServerGuard {
    skein_test::spawn_server(Config::default()).await.unwrap()
}

/// S1: serial completion.
#[tokio::test]
async fn serial_completion() {
    let guard = server().await;
    let mut client = guard.connect().await.unwrap();

    let scheduler_id = client.initialize("random", None).await.unwrap();
    let (_, main) = client.attach(scheduler_id).await.unwrap();

    let a = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();

    let next = client.complete_operation(scheduler_id, a).await.unwrap();
    assert_eq!(next, main);
}

/// S2 (single-target form): `WaitOperation` is the only wait variant spec
/// §6's wire table exposes — `WaitOperationsAllAny`'s multi-target wait-all
/// stays an in-process-only API, already covered by `skein-core`'s own
/// `s2_wait_all` unit test. `main` is always the scheduled caller
/// immediately after `Attach`.
#[tokio::test]
async fn wait_operation_blocks_the_caller_until_its_target_completes() {
    let guard = server().await;
    let mut client = guard.connect().await.unwrap();

    let scheduler_id = client.initialize("random", None).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let a = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();

    // main blocks on a; ScheduleNext has nothing else enabled to pick.
    let scheduled = client.wait_operation(scheduler_id, a).await.unwrap();
    assert_eq!(scheduled, a);

    let next = client.complete_operation(scheduler_id, a).await.unwrap();
    // Completing a re-enables main, which is the only thing left.
    assert_ne!(next, Sid::NIL);
}

/// S3: resource signal. `WaitResource`'s caller is implicit (whichever
/// operation is currently scheduled), so the schedule is forced via
/// `Replay` to put `a` in that seat before it waits on the resource.
/// Sequence ids: main=1, a=2.
#[tokio::test]
async fn resource_signal_reenables_the_waiter() {
    let guard = server().await;
    let mut client = guard.connect().await.unwrap();

    let scheduler_id = client.initialize("replay", Some("2,1,2")).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let resource = Sid::new();
    client.create_resource(scheduler_id, resource).await.unwrap();

    let a = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();

    // Replay entry "2": a becomes the scheduled (and so implicit-caller)
    // operation.
    let scheduled = client.schedule_next(scheduler_id).await.unwrap();
    assert_eq!(scheduled, a);

    // a blocks on the resource; replay entry "1" hands the seat to main,
    // the only other operation still enabled.
    let scheduled = client.wait_resource(scheduler_id, resource).await.unwrap();
    assert!(!scheduled.is_nil());

    // Signalling a re-enables it; replay entry "2" forces ScheduleNext to
    // pick it again.
    client
        .signal_operation(scheduler_id, resource, a)
        .await
        .unwrap();
    let next = client.schedule_next(scheduler_id).await.unwrap();
    assert_eq!(next, a);
}

/// S4, first half: waiting on an operation id that was never created fails
/// immediately with `NotExistingOperation` rather than reporting a deadlock
/// — the scheduler has no way to distinguish "not yet created" from "will
/// never exist", so it surfaces the caller's mistake directly instead of
/// waiting forever. Mirrors `skein-core`'s own
/// `s4_deadlock_is_detected_and_disables_the_scheduler` unit test.
#[tokio::test]
async fn waiting_on_an_operation_that_was_never_created_is_rejected() {
    let guard = server().await;
    let mut client = guard.connect().await.unwrap();

    let scheduler_id = client.initialize("random", None).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let ghost = Sid::new();
    let err = client.wait_operation(scheduler_id, ghost).await.unwrap_err();
    assert_eq!(
        err.error_code(),
        Some(skein_protocol::ErrorCode::NotExistingOperation)
    );
}

/// S4, second half: a genuine cycle (`main` waits on `a`, `a` waits on `b`,
/// `b` waits on `a`) leaves nothing enabled and is reported as a deadlock,
/// which disables the scheduler until the next `Detach`. The schedule is
/// forced via `Replay` so which operation gets picked at each step doesn't
/// depend on `Random`'s draw.
#[tokio::test]
async fn a_genuine_wait_cycle_is_reported_as_a_deadlock() {
    let guard = skein_test::spawn_server(Config::default()).await.unwrap();
    let mut client = guard.connect().await.unwrap();

    // Sequence ids are assigned in creation order: main=1, a=2, b=3.
    let scheduler_id = client.initialize("replay", Some("2,3")).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let a = Sid::new();
    let b = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();
    client.create_operation(scheduler_id, b).await.unwrap();
    client.start_operation(scheduler_id, b).await.unwrap();

    // main blocks on a; replay forces a to run next.
    let scheduled = client.wait_operation(scheduler_id, a).await.unwrap();
    assert_eq!(scheduled, a);

    // a blocks on b; replay forces b to run next.
    let scheduled = client.wait_operation(scheduler_id, b).await.unwrap();
    assert_eq!(scheduled, b);

    // b blocks on a; nothing is left enabled.
    let err = client.wait_operation(scheduler_id, a).await.unwrap_err();
    assert_eq!(
        err.error_code(),
        Some(skein_protocol::ErrorCode::DeadlockDetected)
    );

    let err = client.schedule_next(scheduler_id).await.unwrap_err();
    assert_eq!(
        err.error_code(),
        Some(skein_protocol::ErrorCode::SchedulerDisabled)
    );
}

/// S5: replay round trip (testable property 5).
#[tokio::test]
async fn replay_reproduces_a_recorded_trace() {
    let recorded = {
        let guard = server().await;
        let mut client = guard.connect().await.unwrap();
        let scheduler_id = client.initialize("random", None).await.unwrap();
        client.attach(scheduler_id).await.unwrap();

        let a = Sid::new();
        let b = Sid::new();
        client.create_operation(scheduler_id, a).await.unwrap();
        client.start_operation(scheduler_id, a).await.unwrap();
        client.create_operation(scheduler_id, b).await.unwrap();
        client.start_operation(scheduler_id, b).await.unwrap();
        client.complete_operation(scheduler_id, a).await.unwrap();
        client.complete_operation(scheduler_id, b).await.unwrap();

        client.get_trace(scheduler_id).await.unwrap()
    };

    let guard = server().await;
    let mut client = guard.connect().await.unwrap();
    let scheduler_id = client.initialize("replay", Some(&recorded)).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let a = Sid::new();
    let b = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();
    client.create_operation(scheduler_id, b).await.unwrap();
    client.start_operation(scheduler_id, b).await.unwrap();
    client.complete_operation(scheduler_id, a).await.unwrap();
    client.complete_operation(scheduler_id, b).await.unwrap();

    let replayed = client.get_trace(scheduler_id).await.unwrap();
    assert_eq!(replayed, recorded);
}

/// Testable property 6: determinism under a fixed seed and an identical
/// request sequence.
#[tokio::test]
async fn identical_seeded_runs_produce_identical_traces() {
    async fn run() -> String {
        let config = Config {
            random_seed: 7,
            ..Config::default()
        };
        let guard = skein_test::spawn_server(config).await.unwrap();
        let mut client = guard.connect().await.unwrap();
        let scheduler_id = client.initialize("random", None).await.unwrap();
        client.attach(scheduler_id).await.unwrap();

        let a = Sid::new();
        let b = Sid::new();
        client.create_operation(scheduler_id, a).await.unwrap();
        client.start_operation(scheduler_id, a).await.unwrap();
        client.create_operation(scheduler_id, b).await.unwrap();
        client.start_operation(scheduler_id, b).await.unwrap();
        client.complete_operation(scheduler_id, a).await.unwrap();
        client.complete_operation(scheduler_id, b).await.unwrap();

        client.get_trace(scheduler_id).await.unwrap()
    }

    assert_eq!(run().await, run().await);
}

/// S6: PCT demotion bound, driven over the wire.
#[tokio::test]
async fn pct_demotions_stay_within_the_configured_bound() {
    let config = Config {
        strategy_bound: 2,
        max_unfair_scheduling_steps: 100,
        ..Config::default()
    };
    let guard = skein_test::spawn_server(config).await.unwrap();
    let mut client = guard.connect().await.unwrap();

    let scheduler_id = client.initialize("pct", None).await.unwrap();
    client.attach(scheduler_id).await.unwrap();

    let a = Sid::new();
    let b = Sid::new();
    client.create_operation(scheduler_id, a).await.unwrap();
    client.start_operation(scheduler_id, a).await.unwrap();
    client.create_operation(scheduler_id, b).await.unwrap();
    client.start_operation(scheduler_id, b).await.unwrap();

    let mut last = None;
    let mut changes = 0;
    for _ in 0..5 {
        let next = client.schedule_next(scheduler_id).await.unwrap();
        if let Some(prev) = last {
            if prev != next {
                changes += 1;
            }
        }
        last = Some(next);
    }

    assert!(changes <= 2);
}
