//! Operation-selection strategies (spec §4.4, "Operation-selection
//! strategies"): `Random`, `ProbabilisticRandom`, `Pct`, `Replay`, `Combo`.

use std::collections::HashMap;

use crate::id::SequenceId;
use crate::random::RandomSource;

use super::{OperationStrategy, StrategyInfo};

/// Uniform pick among the enabled set.
///
/// The baseline strategy: fair (every enabled operation has a nonzero chance
/// of selection every step, so none is starved forever), bounded by
/// `max_fair_scheduling_steps`.
pub struct Random {
    max_steps: u32,
    step_count: u32,
}

impl Random {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            step_count: 0,
        }
    }
}

impl StrategyInfo for Random {
    fn initialize_next_iteration(&mut self, _iteration: u64) {
        self.step_count = 0;
    }

    fn step_count(&self) -> u32 {
        self.step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        self.step_count >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "random".to_owned()
    }
}

impl OperationStrategy for Random {
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        _current: Option<SequenceId>,
        _is_yielding: bool,
        random: &RandomSource,
    ) -> Option<SequenceId> {
        self.step_count += 1;
        random.choose(enabled).copied()
    }
}

/// Like [`Random`], but exposes a bias toward `true` for boolean/integer
/// choices made through the same source of randomness — "used to force
/// occasional boolean choices" (spec §4.4). The operation-selection behavior
/// itself is identical to `Random`; `probability_of_true` is consulted by
/// callers making a `GetNextBoolean` request against a scheduler configured
/// with this strategy.
pub struct ProbabilisticRandom {
    inner: Random,
    /// `1/N` bias toward `true`, where `n` is the constructor argument.
    probability_of_true: f64,
}

impl ProbabilisticRandom {
    pub fn new(max_steps: u32, n: u32) -> Self {
        let n = n.max(1);
        Self {
            inner: Random::new(max_steps),
            probability_of_true: 1.0 / f64::from(n),
        }
    }

    /// The bias toward `true` this strategy applies to boolean choices.
    pub fn probability_of_true(&self) -> f64 {
        self.probability_of_true
    }
}

impl StrategyInfo for ProbabilisticRandom {
    fn initialize_next_iteration(&mut self, iteration: u64) {
        self.inner.initialize_next_iteration(iteration);
    }

    fn step_count(&self) -> u32 {
        self.inner.step_count()
    }

    fn is_max_steps_reached(&self) -> bool {
        self.inner.is_max_steps_reached()
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("probabilistic-random(p={:.4})", self.probability_of_true)
    }
}

impl OperationStrategy for ProbabilisticRandom {
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        current: Option<SequenceId>,
        is_yielding: bool,
        random: &RandomSource,
    ) -> Option<SequenceId> {
        self.inner
            .next_operation(enabled, current, is_yielding, random)
    }

    fn next_boolean(&self, random: &RandomSource) -> bool {
        random.next_bool_with_probability(self.probability_of_true)
    }
}

/// Priority-based Concurrency Testing (spec §4.4).
///
/// Assigns each operation it has seen a random priority the first time it
/// appears in the enabled set (priorities are otherwise stable for the rest
/// of the iteration). At up to `d` random priority change points chosen at
/// the start of the iteration, the currently-highest-priority enabled
/// operation is demoted to the lowest priority. Always runs the
/// highest-priority enabled operation. Unfair by construction: a
/// low-priority operation can be starved for an entire iteration.
pub struct Pct {
    /// `d`: the number of priority change points (spec's `strategyBound`).
    change_points: u32,
    max_steps: u32,
    step_count: u32,
    priorities: HashMap<SequenceId, u32>,
    next_priority: u32,
    /// Steps (within the current iteration) at which a demotion fires.
    pending_change_points: Vec<u32>,
}

impl Pct {
    pub fn new(change_points: u32, max_steps: u32) -> Self {
        Self {
            change_points,
            max_steps,
            step_count: 0,
            priorities: HashMap::new(),
            next_priority: 0,
            pending_change_points: Vec::new(),
        }
    }

    fn priority_of(&mut self, id: SequenceId, random: &RandomSource) -> u32 {
        if let Some(&p) = self.priorities.get(&id) {
            return p;
        }

        // Lower numbers are higher priority. A freshly-seen operation gets a
        // uniformly random rank among the operations already seen, with
        // everything at or above that rank bumped up to make room, rather
        // than always landing at the bottom — demotions then shuffle things
        // further as the iteration proceeds.
        let rank = random.next_usize(self.priorities.len() + 1) as u32;
        for p in self.priorities.values_mut() {
            if *p >= rank {
                *p += 1;
            }
        }
        self.priorities.insert(id, rank);
        self.next_priority += 1;
        rank
    }
}

impl StrategyInfo for Pct {
    fn initialize_next_iteration(&mut self, _iteration: u64) {
        self.step_count = 0;
        self.priorities.clear();
        self.next_priority = 0;
        self.pending_change_points.clear();
    }

    fn step_count(&self) -> u32 {
        self.step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        self.step_count >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        format!("pct(d={})", self.change_points)
    }
}

impl OperationStrategy for Pct {
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        _current: Option<SequenceId>,
        _is_yielding: bool,
        random: &RandomSource,
    ) -> Option<SequenceId> {
        if enabled.is_empty() {
            return None;
        }

        for &id in enabled {
            self.priority_of(id, random);
        }

        if self.pending_change_points.is_empty() && self.step_count == 0 {
            let bound = self.max_steps.max(1);
            let count = self.change_points.min(bound);
            self.pending_change_points = (0..count).map(|_| random.next(u64::from(bound)) as u32).collect();
            self.pending_change_points.sort_unstable();
        }

        self.step_count += 1;

        if self.pending_change_points.contains(&(self.step_count - 1)) {
            // Demote the current highest-priority enabled operation to the
            // bottom of the priority order.
            if let Some(&highest) = enabled
                .iter()
                .min_by_key(|id| self.priorities.get(id).copied().unwrap_or(u32::MAX))
            {
                let bottom = self.next_priority;
                self.next_priority += 1;
                self.priorities.insert(highest, bottom);
            }
        }

        enabled
            .iter()
            .copied()
            .min_by_key(|id| self.priorities.get(id).copied().unwrap_or(u32::MAX))
    }
}

/// Replays a prerecorded schedule trace (spec §4.4).
///
/// Consumes the `sequenceId`s of a parsed trace (see
/// [`crate::trace::ScheduleTrace::parse_wire_string`]) in order. Fails the
/// iteration (`next_operation` returns `None`) if the next recorded
/// `sequenceId` is not in the current enabled set, or if the trace is
/// exhausted while operations remain.
pub struct Replay {
    trace: Vec<SequenceId>,
    cursor: usize,
    max_steps: u32,
    step_count: u32,
}

impl Replay {
    pub fn new(trace: Vec<SequenceId>, max_steps: u32) -> Self {
        Self {
            trace,
            cursor: 0,
            max_steps,
            step_count: 0,
        }
    }
}

impl StrategyInfo for Replay {
    fn initialize_next_iteration(&mut self, _iteration: u64) {
        self.cursor = 0;
        self.step_count = 0;
    }

    fn step_count(&self) -> u32 {
        self.step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        self.step_count >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        format!("replay({} entries)", self.trace.len())
    }
}

impl OperationStrategy for Replay {
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        _current: Option<SequenceId>,
        _is_yielding: bool,
        _random: &RandomSource,
    ) -> Option<SequenceId> {
        let next = *self.trace.get(self.cursor)?;
        if !enabled.contains(&next) {
            return None;
        }

        self.cursor += 1;
        self.step_count += 1;
        Some(next)
    }
}

/// Runs a prefix strategy for a configured number of steps, then switches
/// permanently to a suffix strategy (spec §4.4).
///
/// The switch point is `safety_prefix_bound` steps (spec §6), grounded in the
/// same "safety prefix, then fuzz" shape `durable-runtime`'s worker uses to
/// run a deterministic warmup before handing control to its scheduler.
pub struct Combo {
    prefix: Box<dyn OperationStrategy>,
    suffix: Box<dyn OperationStrategy>,
    prefix_steps: u32,
    step_count: u32,
}

impl Combo {
    pub fn new(
        prefix: Box<dyn OperationStrategy>,
        suffix: Box<dyn OperationStrategy>,
        prefix_steps: u32,
    ) -> Self {
        Self {
            prefix,
            suffix,
            prefix_steps,
            step_count: 0,
        }
    }

    fn in_prefix(&self) -> bool {
        self.step_count < self.prefix_steps
    }
}

impl StrategyInfo for Combo {
    fn initialize_next_iteration(&mut self, iteration: u64) {
        self.step_count = 0;
        self.prefix.initialize_next_iteration(iteration);
        self.suffix.initialize_next_iteration(iteration);
    }

    fn step_count(&self) -> u32 {
        self.step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        if self.in_prefix() {
            self.prefix.is_max_steps_reached()
        } else {
            self.suffix.is_max_steps_reached()
        }
    }

    fn is_fair(&self) -> bool {
        self.suffix.is_fair()
    }

    fn description(&self) -> String {
        format!(
            "combo(prefix={}, suffix={}, switch_at={})",
            self.prefix.description(),
            self.suffix.description(),
            self.prefix_steps
        )
    }
}

impl OperationStrategy for Combo {
    fn next_operation(
        &mut self,
        enabled: &[SequenceId],
        current: Option<SequenceId>,
        is_yielding: bool,
        random: &RandomSource,
    ) -> Option<SequenceId> {
        let was_in_prefix = self.in_prefix();
        self.step_count += 1;

        if was_in_prefix {
            self.prefix
                .next_operation(enabled, current, is_yielding, random)
        } else {
            self.suffix
                .next_operation(enabled, current, is_yielding, random)
        }
    }
}
