//! Delay-injection strategies (spec §4.4, "Delay-injection strategies").
//!
//! These do not choose operations; they choose a cooperative delay the
//! program under test is expected to honor before its next step. The numeric
//! constants in each implementation are normative, taken verbatim from the
//! spec's table.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;

use crate::id::SequenceId;
use crate::random::RandomSource;

use super::{DelayStrategy, StrategyInfo};

/// Shared bookkeeping every delay strategy below reuses: an iteration
/// counter and a step counter, since none of them has its own notion of a
/// step budget distinct from the scheduler's (spec §4.4 does not define a
/// separate max-steps concept for delay strategies; `is_max_steps_reached`
/// always reports `false` and the scheduler's own step cap governs).
#[derive(Default)]
struct IterationState {
    iteration: u64,
    step_count: u32,
}

impl IterationState {
    fn begin(&mut self, iteration: u64) {
        self.iteration = iteration;
        self.step_count = 0;
    }

    fn step(&mut self) -> u32 {
        self.step_count += 1;
        self.step_count
    }
}

macro_rules! trivial_strategy_info {
    ($ty:ident, $description:expr, $fair:expr) => {
        impl StrategyInfo for $ty {
            fn initialize_next_iteration(&mut self, iteration: u64) {
                self.state.lock().begin(iteration);
            }

            fn step_count(&self) -> u32 {
                self.state.lock().step_count
            }

            fn is_max_steps_reached(&self) -> bool {
                false
            }

            fn is_fair(&self) -> bool {
                $fair
            }

            fn description(&self) -> String {
                $description.to_owned()
            }
        }
    };
}

/// Uniform `[0, maxValue)`.
#[derive(Default)]
pub struct Random {
    state: Mutex<IterationState>,
}

trivial_strategy_info!(Random, "delay-random", true);

#[async_trait::async_trait]
impl DelayStrategy for Random {
    async fn next_delay(
        &self,
        _task: SequenceId,
        max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();
        if max_value == 0 {
            return Some(0);
        }
        Some(random.next(max_value))
    }
}

/// With probability 0.01, uniform `[0, maxValue)`; else 0.
#[derive(Default)]
pub struct LowDelayPercentage {
    state: Mutex<IterationState>,
}

trivial_strategy_info!(LowDelayPercentage, "low-delay-percentage", true);

#[async_trait::async_trait]
impl DelayStrategy for LowDelayPercentage {
    async fn next_delay(
        &self,
        _task: SequenceId,
        max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();
        if max_value > 0 && random.next_bool_with_probability(0.01) {
            Some(random.next(max_value))
        } else {
            Some(0)
        }
    }
}

/// Per task: 50% double the current delay (starting from 1), 50% keep it,
/// capped at 500.
pub struct CoinToss {
    state: Mutex<IterationState>,
    current: Mutex<HashMap<SequenceId, u64>>,
}

impl Default for CoinToss {
    fn default() -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            current: Mutex::new(HashMap::new()),
        }
    }
}

trivial_strategy_info!(CoinToss, "coin-toss", true);

const COIN_TOSS_CAP: u64 = 500;

#[async_trait::async_trait]
impl DelayStrategy for CoinToss {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();
        let mut current = self.current.lock();
        let delay = current.entry(task).or_insert(1);

        if random.next_bool_with_probability(0.5) {
            *delay = (*delay * 2).min(COIN_TOSS_CAP);
        }

        Some(*delay)
    }
}

/// With probability 0.05, uniform `[0, 100)`; per-task running total capped
/// at 5000.
pub struct TorchRandom {
    state: Mutex<IterationState>,
    totals: Mutex<HashMap<SequenceId, u64>>,
}

impl Default for TorchRandom {
    fn default() -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            totals: Mutex::new(HashMap::new()),
        }
    }
}

trivial_strategy_info!(TorchRandom, "torch-random", true);

const TORCH_RANDOM_TOTAL_CAP: u64 = 5000;

#[async_trait::async_trait]
impl DelayStrategy for TorchRandom {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();

        if !random.next_bool_with_probability(0.05) {
            return Some(0);
        }

        let mut totals = self.totals.lock();
        let total = totals.entry(task).or_insert(0);
        let remaining = TORCH_RANDOM_TOTAL_CAP.saturating_sub(*total);
        if remaining == 0 {
            return Some(0);
        }

        let delay = random.next(100).min(remaining);
        *total += delay;
        Some(delay)
    }
}

/// Partitions tasks into low/high-priority bags, low-priority probability
/// 0.05, reshuffled every `max_steps / 5` steps; high-priority delay is
/// always 0, low-priority is uniform on `[0,50)` or `[50,100)` depending on
/// bag weight.
pub struct Ppct {
    state: Mutex<IterationState>,
    max_steps: u32,
    low_priority: Mutex<HashMap<SequenceId, bool>>,
    heavy_bag: Mutex<bool>,
}

impl Ppct {
    pub fn new(max_steps: u32) -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            max_steps: max_steps.max(1),
            low_priority: Mutex::new(HashMap::new()),
            heavy_bag: Mutex::new(false),
        }
    }
}

trivial_strategy_info!(Ppct, "ppct", true);

#[async_trait::async_trait]
impl DelayStrategy for Ppct {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        let step = self.state.lock().step();

        let reshuffle_every = (self.max_steps / 5).max(1);
        if step % reshuffle_every == 1 {
            self.low_priority.lock().clear();
            *self.heavy_bag.lock() = random.next_bool_with_probability(0.5);
        }

        let is_low_priority = *self
            .low_priority
            .lock()
            .entry(task)
            .or_insert_with(|| random.next_bool_with_probability(0.05));

        if !is_low_priority {
            return Some(0);
        }

        let heavy = *self.heavy_bag.lock();
        if heavy {
            Some(50 + random.next(50))
        } else {
            Some(random.next(50))
        }
    }
}

/// Per task step counter; at random priority change points drawn from
/// `[0, observedMaxStepCount)`, inject `Next(10) * 50`ms; otherwise 0. The
/// number of change points grows every 1000 iterations, up to
/// `observedMaxStepCount`.
pub struct FairPct {
    state: Mutex<IterationState>,
    task_steps: Mutex<HashMap<SequenceId, u32>>,
    change_points: Mutex<Vec<u32>>,
    observed_max_step_count: Mutex<u32>,
}

impl Default for FairPct {
    fn default() -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            task_steps: Mutex::new(HashMap::new()),
            change_points: Mutex::new(Vec::new()),
            observed_max_step_count: Mutex::new(1),
        }
    }
}

impl StrategyInfo for FairPct {
    fn initialize_next_iteration(&mut self, iteration: u64) {
        self.state.get_mut().begin(iteration);
        self.task_steps.get_mut().clear();

        let observed = *self.observed_max_step_count.get_mut();
        let growth = 1 + (iteration / 1000) as u32;
        let count = growth.min(observed.max(1));
        *self.change_points.get_mut() = Vec::with_capacity(count as usize);
    }

    fn step_count(&self) -> u32 {
        self.state.lock().step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        false
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "fair-pct".to_owned()
    }
}

#[async_trait::async_trait]
impl DelayStrategy for FairPct {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();

        let step = {
            let mut steps = self.task_steps.lock();
            let entry = steps.entry(task).or_insert(0);
            let step = *entry;
            *entry += 1;
            step
        };

        {
            let mut observed = self.observed_max_step_count.lock();
            *observed = (*observed).max(step + 1);
        }

        let mut change_points = self.change_points.lock();
        if change_points.is_empty() {
            let observed = *self.observed_max_step_count.lock();
            let slots = change_points.capacity().max(1);
            for _ in 0..slots {
                change_points.push(random.next_usize(observed.max(1) as usize) as u32);
            }
        }

        if change_points.contains(&step) {
            Some(u64::from(random.next_usize(10) as u32) * 50)
        } else {
            Some(0)
        }
    }
}

/// Flips at iteration start between `OneStop` (exactly one task kept at
/// delay 0, the rest get 100) and `OneGo` (exactly one task gets 100, the
/// rest get 0).
pub struct OneStopOneGo {
    state: Mutex<IterationState>,
    one_stop: Mutex<bool>,
    chosen: Mutex<Option<SequenceId>>,
}

impl Default for OneStopOneGo {
    fn default() -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            one_stop: Mutex::new(true),
            chosen: Mutex::new(None),
        }
    }
}

impl StrategyInfo for OneStopOneGo {
    fn initialize_next_iteration(&mut self, iteration: u64) {
        self.state.get_mut().begin(iteration);
        let one_stop = self.one_stop.get_mut();
        *one_stop = !*one_stop;
        *self.chosen.get_mut() = None;
    }

    fn step_count(&self) -> u32 {
        self.state.lock().step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        false
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        if *self.one_stop.lock() {
            "one-stop-one-go(mode=one-stop)".to_owned()
        } else {
            "one-stop-one-go(mode=one-go)".to_owned()
        }
    }
}

#[async_trait::async_trait]
impl DelayStrategy for OneStopOneGo {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        _random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();

        let chosen = *self.chosen.lock().get_or_insert(task);
        let one_stop = *self.one_stop.lock();
        let is_chosen = chosen == task;

        let delay = match (one_stop, is_chosen) {
            (true, true) => 0,
            (true, false) => 100,
            (false, true) => 100,
            (false, false) => 0,
        };
        Some(delay)
    }
}

/// Registry of parking latches for [`RapidContextSwitch`], one per
/// registered task. Grounded in `durable_runtime::flag::ShutdownFlag`'s
/// `AtomicBool` + [`Notify`] shape.
#[derive(Default)]
pub struct ParkRegistry {
    latches: Mutex<HashMap<SequenceId, std::sync::Arc<Notify>>>,
}

impl ParkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: SequenceId) {
        self.latches
            .lock()
            .entry(task)
            .or_insert_with(|| std::sync::Arc::new(Notify::new()));
    }

    fn latch_for(&self, task: SequenceId) -> std::sync::Arc<Notify> {
        self.latches
            .lock()
            .entry(task)
            .or_insert_with(|| std::sync::Arc::new(Notify::new()))
            .clone()
    }

    /// Wake a random other registered task, if any is registered besides
    /// `excluding`.
    fn wake_random_other(&self, excluding: SequenceId, random: &RandomSource) {
        let candidates: Vec<SequenceId> = self
            .latches
            .lock()
            .keys()
            .copied()
            .filter(|&id| id != excluding)
            .collect();

        if let Some(&target) = random.choose(&candidates) {
            self.latch_for(target).notify_one();
        }
    }
}

/// Synchronously parks the calling task; wakes a random other registered
/// task; bounds the wait at 300ms.
pub struct RapidContextSwitch {
    state: Mutex<IterationState>,
    registry: std::sync::Arc<ParkRegistry>,
}

const RAPID_CONTEXT_SWITCH_BOUND: Duration = Duration::from_millis(300);

impl RapidContextSwitch {
    pub fn new(registry: std::sync::Arc<ParkRegistry>) -> Self {
        Self {
            state: Mutex::new(IterationState::default()),
            registry,
        }
    }
}

trivial_strategy_info!(RapidContextSwitch, "rapid-context-switch", true);

#[async_trait::async_trait]
impl DelayStrategy for RapidContextSwitch {
    async fn next_delay(
        &self,
        task: SequenceId,
        _max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();

        self.registry.register(task);
        let latch = self.registry.latch_for(task);
        self.registry.wake_random_other(task, random);

        let _ = timeout(RAPID_CONTEXT_SWITCH_BOUND, latch.notified()).await;
        Some(0)
    }
}

/// Rotates between the other delay strategies by iteration.
pub struct Portfolio {
    state: Mutex<IterationState>,
    members: Vec<Box<dyn DelayStrategy>>,
    current: Mutex<usize>,
}

impl Portfolio {
    pub fn new(members: Vec<Box<dyn DelayStrategy>>) -> Self {
        assert!(!members.is_empty(), "Portfolio requires at least one member strategy");
        Self {
            state: Mutex::new(IterationState::default()),
            members,
            current: Mutex::new(0),
        }
    }

    fn active_index(&self, iteration: u64) -> usize {
        iteration as usize % self.members.len()
    }
}

impl StrategyInfo for Portfolio {
    fn initialize_next_iteration(&mut self, iteration: u64) {
        self.state.get_mut().begin(iteration);
        let index = self.active_index(iteration);
        *self.current.get_mut() = index;
        self.members[index].initialize_next_iteration(iteration);
    }

    fn step_count(&self) -> u32 {
        self.members[*self.current.lock()].step_count()
    }

    fn is_max_steps_reached(&self) -> bool {
        self.members[*self.current.lock()].is_max_steps_reached()
    }

    fn is_fair(&self) -> bool {
        self.members[*self.current.lock()].is_fair()
    }

    fn description(&self) -> String {
        format!(
            "portfolio(active={})",
            self.members[*self.current.lock()].description()
        )
    }
}

#[async_trait::async_trait]
impl DelayStrategy for Portfolio {
    async fn next_delay(
        &self,
        task: SequenceId,
        max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        self.state.lock().step();
        let index = *self.current.lock();
        self.members[index].next_delay(task, max_value, random).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> SequenceId {
        n.to_string().parse().unwrap()
    }

    #[tokio::test]
    async fn random_delay_is_within_bounds() {
        let strategy = Random::default();
        let random = RandomSource::new(1);
        for _ in 0..200 {
            let delay = strategy.next_delay(seq(1), 100, &random).await.unwrap();
            assert!(delay < 100);
        }
    }

    #[tokio::test]
    async fn low_delay_percentage_is_usually_zero() {
        let strategy = LowDelayPercentage::default();
        let random = RandomSource::new(3);
        let mut zero_count = 0;
        for _ in 0..1000 {
            if strategy.next_delay(seq(1), 1000, &random).await == Some(0) {
                zero_count += 1;
            }
        }
        assert!(zero_count > 900, "expected the 0.01 strategy to mostly return 0, got {zero_count}/1000 zeros");
    }

    #[tokio::test]
    async fn coin_toss_never_exceeds_cap() {
        let strategy = CoinToss::default();
        let random = RandomSource::new(9);
        let mut last = 0;
        for _ in 0..200 {
            last = strategy.next_delay(seq(1), 0, &random).await.unwrap();
            assert!(last <= COIN_TOSS_CAP);
        }
        let _ = last;
    }

    #[tokio::test]
    async fn torch_random_respects_per_task_cap() {
        let strategy = TorchRandom::default();
        let random = RandomSource::new(11);
        let mut total = 0u64;
        for _ in 0..5000 {
            total += strategy.next_delay(seq(1), 0, &random).await.unwrap();
        }
        assert!(total <= TORCH_RANDOM_TOTAL_CAP);
    }

    #[tokio::test]
    async fn one_stop_one_go_gives_exactly_one_task_the_opposite_delay() {
        let mut strategy = OneStopOneGo::default();
        strategy.initialize_next_iteration(0);
        let random = RandomSource::new(1);

        let a = strategy.next_delay(seq(1), 0, &random).await.unwrap();
        let b = strategy.next_delay(seq(2), 0, &random).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn rapid_context_switch_returns_within_bound() {
        let registry = std::sync::Arc::new(ParkRegistry::new());
        let strategy = RapidContextSwitch::new(registry);
        let random = RandomSource::new(1);

        let started = tokio::time::Instant::now();
        strategy.next_delay(seq(1), 0, &random).await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn portfolio_rotates_members_by_iteration() {
        let members: Vec<Box<dyn DelayStrategy>> =
            vec![Box::new(Random::default()), Box::new(LowDelayPercentage::default())];
        let mut portfolio = Portfolio::new(members);

        portfolio.initialize_next_iteration(0);
        assert_eq!(portfolio.description(), "portfolio(active=delay-random)");

        portfolio.initialize_next_iteration(1);
        assert_eq!(portfolio.description(), "portfolio(active=low-delay-percentage)");
    }
}
