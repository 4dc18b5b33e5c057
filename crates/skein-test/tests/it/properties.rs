//! Testable properties 7 and 8 from the scheduler's design notes: the PCT
//! demotion bound (checked via `proptest` across many shapes) and Random's
//! asymptotic fairness (checked as a bounded-run smoke test, since the
//! property itself is a probability-1 statement over an unbounded sequence
//! and cannot be proven by any finite test).
//!
//! Driven directly against `skein_core::Scheduler` rather than over the
//! wire: these are statistical/combinatorial checks over many iterations,
//! and the in-process scheduler is already exercised end to end by
//! `scenarios.rs`, so there is nothing about the transport left to prove
//! here.

use proptest::prelude::*;
use skein_core::strategy::operation::{Pct, Random};
use skein_core::{Config, Scheduler, Sid};

fn scheduler_with(strategy: Box<dyn skein_core::OperationStrategy>) -> Scheduler {
    Scheduler::new(Sid::new(), Config::default(), strategy)
}

/// Testable property 7: in any iteration of PCT with parameter `d`, the
/// number of priority demotions observed (here approximated by the number
/// of times the operation ScheduleNext hands back changes identity) is at
/// most `d`.
proptest! {
    #[test]
    fn pct_top_priority_changes_stay_within_d(
        d in 0u32..6,
        operation_count in 2usize..6,
        step_count in 1usize..30,
    ) {
        let scheduler = scheduler_with(Box::new(Pct::new(d, step_count as u32)));
        scheduler.attach().unwrap();

        let operations: Vec<Sid> = (0..operation_count).map(|_| Sid::new()).collect();
        for &id in &operations {
            scheduler.create_operation(id).unwrap();
            scheduler.start_operation(id).unwrap();
        }

        let mut last = None;
        let mut changes = 0u32;
        for _ in 0..step_count {
            let next = scheduler.schedule_next().unwrap();
            if let Some(prev) = last {
                if prev != next {
                    changes += 1;
                }
            }
            last = Some(next);
        }

        prop_assert!(changes <= d);
    }
}

/// Testable property 8: Random's fairness. Not provable in a finite test
/// (the property is a probability-1 statement over an unbounded sequence),
/// so this asserts the practically-meaningful consequence instead: every
/// persistently-enabled operation is picked at least once within a run long
/// enough that the chance of missing any of them is astronomically small
/// under uniform selection.
#[test]
fn random_selects_every_persistently_enabled_operation_within_a_bounded_run() {
    let scheduler = scheduler_with(Box::new(Random::new(u32::MAX)));
    scheduler.attach().unwrap();

    let operation_count = 5;
    let operations: Vec<Sid> = (0..operation_count).map(|_| Sid::new()).collect();
    for &id in &operations {
        scheduler.create_operation(id).unwrap();
        scheduler.start_operation(id).unwrap();
    }

    let mut seen = std::collections::HashSet::new();
    // (4/5)^300 is effectively zero; this is a smoke test, not a proof.
    for _ in 0..300 {
        let next = scheduler.schedule_next().unwrap();
        seen.insert(next);
        if seen.len() == operations.len() + 1 {
            // +1 for `main`, which is also persistently enabled here since
            // nothing ever completes.
            break;
        }
    }

    for &id in &operations {
        assert!(seen.contains(&id), "operation {id} was never scheduled");
    }
}
