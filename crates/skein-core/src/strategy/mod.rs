//! Pluggable scheduling strategies (spec §4.4).
//!
//! The source this system was distilled from used a base class with two
//! overridable hooks and a long subclass hierarchy. Per spec §9's redesign
//! note, this is re-architected as two small, independent traits sharing one
//! common shape — the same move the teacher already made for its own
//! `Scheduler` trait (`durable_runtime::scheduler::Scheduler`, a single small
//! trait with an `acquire`/`notify` pair of hooks, concrete policies
//! implemented as independent values rather than a class hierarchy).
//!
//! [`OperationStrategy`] chooses the next enabled operation to run.
//! [`DelayStrategy`] chooses a cooperative delay to inject before a step.
//! Both share [`StrategyInfo`] for iteration bookkeeping.

pub mod delay;
pub mod liveness;
pub mod operation;

use crate::id::SequenceId;
use crate::random::RandomSource;

/// Bookkeeping shared by every strategy, operation-selection or
/// delay-injection alike.
pub trait StrategyInfo {
    /// Reset any per-iteration state and record the iteration number.
    fn initialize_next_iteration(&mut self, iteration: u64);

    /// The number of scheduling steps taken so far in the current iteration.
    fn step_count(&self) -> u32;

    /// Whether this strategy's configured step budget has been exhausted for
    /// the current iteration (fair strategies are bounded by
    /// `max_fair_scheduling_steps`, unfair ones by
    /// `max_unfair_scheduling_steps` — see [`crate::config::Config`]).
    fn is_max_steps_reached(&self) -> bool;

    /// Whether this strategy is fair: every persistently-enabled operation is
    /// eventually chosen (spec §4.4, Fairness).
    fn is_fair(&self) -> bool;

    /// A short human-readable description, for logging and trace headers.
    fn description(&self) -> String;
}

/// Chooses the next operation to run from the enabled set.
///
/// `enabled` is the current enabled set in no particular order; `current` is
/// the operation presently scheduled (if any); `is_yielding` is reserved by
/// the spec and always `false` in this implementation.
pub trait OperationStrategy: StrategyInfo + Send {
    /// Pick the next operation to run, or `None` if the strategy itself
    /// fails (e.g. `Replay` ran out of trace entries, or the next trace entry
    /// doesn't name any operation in `enabled`).
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        current: Option<SequenceId>,
        is_yielding: bool,
        random: &RandomSource,
    ) -> Option<SequenceId>;

    /// The nondeterministic-choice hook backing `GetNextBoolean` (spec §4.3).
    /// The default is an unbiased coin flip; `ProbabilisticRandom` overrides
    /// this with its configured bias toward `true`.
    fn next_boolean(&self, random: &RandomSource) -> bool {
        random.next_bool_with_probability(0.5)
    }

    /// The nondeterministic-choice hook backing `GetNextInteger` (spec §4.3).
    fn next_integer(&self, random: &RandomSource, max_value: u64) -> u64 {
        random.next(max_value.max(1))
    }
}

/// Chooses a cooperative delay to inject before a step.
///
/// Unlike [`OperationStrategy`], delay strategies are keyed per calling task
/// (`task`) since several of them — `CoinToss`, `TorchRandom`, `FairPct` —
/// maintain independent per-task state. They are consulted directly by an
/// instrumented program under test, not through the scheduler's wire
/// protocol (spec §4.4's delay family is an alternative, weaker exploration
/// mode, not a `ScheduleNext` replacement).
#[async_trait::async_trait]
pub trait DelayStrategy: StrategyInfo + Send + Sync {
    /// Choose a delay in milliseconds to wait before `task`'s next step, or
    /// `None` if the strategy fails.
    async fn next_delay(
        &self,
        task: SequenceId,
        max_value: u64,
        random: &RandomSource,
    ) -> Option<u64>;
}
