//! Scheduler configuration (spec §6, "Configuration inputs").

/// Configuration inputs shared by every strategy attached to a scheduler.
///
/// Modeled on `durable_runtime::config::Config`: a plain struct with a
/// `Default` impl, documented field by field, passed in once at
/// construction.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    /// The maximum number of scheduling steps a *fair* strategy (one that
    /// never permanently starves an enabled operation) is permitted to take
    /// in a single iteration before `IsMaxStepsReached` reports true.
    pub max_fair_scheduling_steps: u32,

    /// The maximum number of scheduling steps an *unfair* strategy (e.g.
    /// `Pct`) is permitted to take in a single iteration.
    ///
    /// Unfair strategies are capped more tightly than fair ones since they
    /// can in principle run forever without making the progress a fair
    /// strategy would guarantee.
    pub max_unfair_scheduling_steps: u32,

    /// The number of steps at the start of an iteration during which
    /// `Combo`'s prefix strategy runs before switching to its suffix
    /// strategy.
    pub safety_prefix_bound: u32,

    /// `d`: the number of priority change points `Pct` is permitted to
    /// introduce in a single iteration.
    pub strategy_bound: u32,

    /// The seed used to construct the scheduler's [`crate::random::RandomSource`].
    pub random_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_fair_scheduling_steps: 10_000,
            max_unfair_scheduling_steps: 100,
            safety_prefix_bound: 0,
            strategy_bound: 2,
            random_seed: 0,
        }
    }
}
