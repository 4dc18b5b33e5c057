//! Maps a wire [`StrategyKind`] onto a concrete `skein_core` operation
//! strategy (spec §6's `Initialize` method).
//!
//! This glue lives in `skein-server` rather than `skein-core` because it is
//! the request handler's job to translate wire configuration into concrete
//! strategy values — `skein-core` only defines the [`skein_core::OperationStrategy`]
//! trait and its implementations, never wire types.

use skein_core::strategy::operation::{Pct, ProbabilisticRandom, Random, Replay};
use skein_core::{Config, OperationStrategy, ScheduleTrace};
use skein_protocol::StrategyKind;

/// Bias denominator `ProbabilisticRandom` uses when selected over the wire.
/// Spec §4.4 leaves `N` to the caller's configuration; the teacher-derived
/// default here favors an occasional (1-in-20) biased choice.
const PROBABILISTIC_BIAS_N: u32 = 20;

/// Build the `OperationStrategy` named by `kind`.
///
/// `trace` is only consulted for [`StrategyKind::Replay`]; it must be the
/// CSV `sequenceId` trace format of spec §3/§6 ("Trace format").
///
/// **Open question resolution (see `DESIGN.md`):** spec §6 lists `fairpct`
/// as an `Initialize`-selectable strategy type, but spec §4.4's table only
/// defines `FairPct` as a *delay-injection* strategy, not an operation
/// selector — there is no priority-based operation strategy in the source
/// with a distinct "fair" variant. Per spec §9's guidance to treat the
/// §4.4 table as authoritative over conflicting legacy naming, `fairpct`
/// here selects the same `Pct` operation-selection algorithm as `pct`; the
/// real `FairPct` (the delay-injection strategy) remains available
/// separately to an instrumented program under test via the delay family,
/// unrelated to `ScheduleNext`'s operation selection.
pub fn build_operation_strategy(
    kind: StrategyKind,
    config: &Config,
    trace: Option<&str>,
) -> anyhow::Result<Box<dyn OperationStrategy>> {
    let strategy: Box<dyn OperationStrategy> = match kind {
        StrategyKind::Random => Box::new(Random::new(config.max_fair_scheduling_steps)),
        StrategyKind::Probabilistic => Box::new(ProbabilisticRandom::new(
            config.max_fair_scheduling_steps,
            PROBABILISTIC_BIAS_N,
        )),
        StrategyKind::Pct | StrategyKind::FairPct => {
            Box::new(Pct::new(config.strategy_bound, config.max_unfair_scheduling_steps))
        }
        StrategyKind::Replay => {
            let entries = match trace {
                Some(text) => ScheduleTrace::parse_wire_string(text)
                    .map_err(|err| anyhow::anyhow!("invalid replay trace: {err}"))?,
                None => Vec::new(),
            };
            Box::new(Replay::new(entries, config.max_unfair_scheduling_steps))
        }
    };
    Ok(strategy)
}
