//! The session registry (spec §4.5, §9: "make the session registry an
//! explicit value injected into the request handler").
//!
//! Grounded in the several retrieval-pack repositories (`stateright`,
//! `kube-rs`, `aptos-core`) that reach for [`dashmap`] for exactly this
//! concurrent-map role; `skein-core` itself never depends on it, since the
//! core has no notion of a session registry — only of a single scheduler.

use std::sync::Arc;

use dashmap::DashMap;
use skein_core::{Config, Sid};
use skein_protocol::StrategyKind;

use crate::strategy::build_operation_strategy;

/// Process-wide (or, in tests, per-harness) session map: `schedulerId ->
/// Scheduler`. Explicit and injected rather than a global singleton, per
/// spec §9's redesign note.
#[derive(Default)]
pub struct Context {
    schedulers: DashMap<Sid, Arc<skein_core::Scheduler>>,
    config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            schedulers: DashMap::new(),
            config,
        }
    }

    /// `Initialize`: allocate a fresh session id, build the requested
    /// strategy (falling back to `Random` for anything unrecognized), and
    /// register the new scheduler. Lookup/insert is lock-free per spec §5.
    pub fn initialize(&self, strategy_type: &str, trace: Option<&str>) -> anyhow::Result<Sid> {
        let kind = StrategyKind::parse(strategy_type);
        let strategy = build_operation_strategy(kind, &self.config, trace)?;
        let id = Sid::new();
        let scheduler = Arc::new(skein_core::Scheduler::new(id, self.config, strategy));
        self.schedulers.insert(id, scheduler);
        Ok(id)
    }

    /// Get-or-create lookup used by every other wire method (spec §4.5).
    /// A lookup miss is a caller error (the scheduler id is opaque and only
    /// ever comes from a prior `Initialize` reply), surfaced by callers as
    /// `NotExistingOperation`-shaped handling at the handler layer.
    pub fn get(&self, id: Sid) -> Option<Arc<skein_core::Scheduler>> {
        self.schedulers.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of live sessions, for diagnostics.
    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }
}
