//! The liveness-checking decorator (spec §4.4, "Liveness wrapper").
//!
//! Wraps a [`DelayStrategy`] and, before each delay, asks an injected
//! [`LivenessOracle`] whether any monitor has exceeded its liveness
//! "temperature" threshold. Only active when the wrapped strategy reports
//! `is_fair() == true` — an unfair strategy's own starvation makes liveness
//! checking meaningless. The oracle itself is a specification-engine
//! concern external to this crate (spec §1); `skein-core` only defines the
//! trait boundary and a no-op default, the same split `skein-core::scheduler`
//! uses for `LivenessOracle`'s sibling, `crate::scheduler::Scheduler`'s
//! attached-client boundary.

use crate::id::SequenceId;
use crate::random::RandomSource;

use super::{DelayStrategy, StrategyInfo};

/// Reports whether any monitored liveness property has exceeded its
/// temperature threshold.
pub trait LivenessOracle: Send + Sync {
    /// Returns `Err` describing the violated monitor if one has tripped.
    fn check(&self) -> Result<(), String>;
}

/// An oracle that never reports a violation, the default when no
/// specification engine is attached.
#[derive(Default)]
pub struct NoopLivenessOracle;

impl LivenessOracle for NoopLivenessOracle {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Wraps a [`DelayStrategy`] with a liveness check consulted before every
/// delay, active only while the wrapped strategy is fair.
pub struct LivenessGuarded<S> {
    inner: S,
    oracle: Box<dyn LivenessOracle>,
}

impl<S: DelayStrategy> LivenessGuarded<S> {
    pub fn new(inner: S, oracle: Box<dyn LivenessOracle>) -> Self {
        Self { inner, oracle }
    }

    pub fn with_noop_oracle(inner: S) -> Self {
        Self::new(inner, Box::new(NoopLivenessOracle))
    }
}

impl<S: DelayStrategy> StrategyInfo for LivenessGuarded<S> {
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
        self.inner.is_fair()
    }

    fn description(&self) -> String {
        format!("liveness-guarded({})", self.inner.description())
    }
}

#[async_trait::async_trait]
impl<S: DelayStrategy> DelayStrategy for LivenessGuarded<S> {
    async fn next_delay(
        &self,
        task: SequenceId,
        max_value: u64,
        random: &RandomSource,
    ) -> Option<u64> {
        if self.inner.is_fair() {
            if let Err(violation) = self.oracle.check() {
                tracing::warn!(monitor = %violation, "liveness temperature threshold exceeded");
            }
        }

        self.inner.next_delay(task, max_value, random).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::delay::Random;

    struct AlwaysViolates;

    impl LivenessOracle for AlwaysViolates {
        fn check(&self) -> Result<(), String> {
            Err("temperature exceeded".to_owned())
        }
    }

    #[tokio::test]
    async fn noop_oracle_never_blocks_delays() {
        let guarded = LivenessGuarded::with_noop_oracle(Random::default());
        let random = RandomSource::new(1);
        let delay = guarded.next_delay(SequenceId::first(), 10, &random).await;
        assert!(delay.is_some());
    }

    #[tokio::test]
    async fn violating_oracle_does_not_prevent_delay_from_completing() {
        let guarded = LivenessGuarded::new(Random::default(), Box::new(AlwaysViolates));
        let random = RandomSource::new(1);
        let delay = guarded.next_delay(SequenceId::first(), 10, &random).await;
        assert!(delay.is_some());
    }
}
