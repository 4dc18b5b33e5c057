//! The operation state machine.
//!
//! An [`Operation`] is the controlled unit of the scheduler: it owns a state
//! machine and its wait/signal links to other operations (spec §3, §4.1).
//! Operations are stored in an [`OperationTable`] keyed by [`Sid`] and
//! referenced by handle (their [`SequenceId`]) to avoid ever forming a real
//! reference cycle — the design note in spec §9 ("model these as sets of
//! stable integer handles... the table owns the operations, the sets hold
//! only handles") is implemented literally here, grounded in the slab-backed
//! table of `durable_runtime::resource::Resources`.

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::error::{ctors, Result};
use crate::id::{SequenceId, Sid};

/// The lifecycle state of an [`Operation`] (spec §3).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OperationStatus {
    /// Created but not yet started.
    None,
    /// Ready to run; present in the scheduler's enabled set.
    Enabled,
    /// Blocked until every operation in `wait_operations` completes.
    BlockedOnWaitAll,
    /// Blocked until any operation in `wait_operations` completes.
    BlockedOnWaitAny,
    /// Blocked on a resource signal.
    BlockedOnResource,
    /// Finished successfully.
    Completed,
    /// Finished via cancellation.
    Canceled,
}

impl OperationStatus {
    /// Whether this is one of the two terminal states (spec's `IsCompleted`).
    pub fn is_completed(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Canceled)
    }

    fn is_blocked(self) -> bool {
        matches!(
            self,
            OperationStatus::BlockedOnWaitAll
                | OperationStatus::BlockedOnWaitAny
                | OperationStatus::BlockedOnResource
        )
    }
}

/// A single controlled unit of execution (spec §3).
///
/// Identified externally by a [`Sid`] supplied by the program under test, and
/// internally by a stable [`SequenceId`] assigned on first creation — the
/// handle used by strategies and recorded in the trace.
pub struct Operation {
    id: Sid,
    sequence_id: SequenceId,
    status: OperationStatus,
    /// Operations this one is blocked on. Cleared whenever the operation
    /// leaves a blocked state (by `TryEnable` succeeding, or directly in
    /// `Complete`/`Cancel`/`Reset`).
    wait_operations: BTreeSet<SequenceId>,
    /// Operations to re-evaluate (`TryEnable`) when this one completes.
    signal_operations: BTreeSet<SequenceId>,
}

impl Operation {
    pub(crate) fn new(id: Sid, sequence_id: SequenceId) -> Self {
        Self {
            id,
            sequence_id,
            status: OperationStatus::None,
            wait_operations: BTreeSet::new(),
            signal_operations: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> Sid {
        self.id
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn wait_operations(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.wait_operations.iter().copied()
    }

    pub fn signal_operations(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.signal_operations.iter().copied()
    }

    /// `Enable`: transition to `Enabled` from `None` or any blocked state.
    ///
    /// Callers (the [`crate::scheduler::Scheduler`]) are responsible for
    /// inserting the returned-to-enabled operation into the enabled set —
    /// this type has no knowledge of the scheduler's tables.
    pub(crate) fn enable(&mut self) -> Result<()> {
        match self.status {
            OperationStatus::None => {
                self.status = OperationStatus::Enabled;
                Ok(())
            }
            s if s.is_blocked() => {
                self.status = OperationStatus::Enabled;
                Ok(())
            }
            OperationStatus::Enabled => Err(ctors::operation_already_started(self.id)),
            OperationStatus::Completed | OperationStatus::Canceled => {
                Err(ctors::operation_already_completed(self.id))
            }
        }
    }

    /// Begin blocking on a single wait target. Returns `true` if this
    /// operation actually blocked, `false` if `target` was already completed
    /// (spec §4.1: `WaitOperation` preconditions `Enabled -> BlockedOnWaitAll`,
    /// but the scheduler short-circuits on an already-completed target before
    /// calling this).
    pub(crate) fn begin_wait_all(&mut self, targets: impl IntoIterator<Item = SequenceId>) {
        self.wait_operations.clear();
        self.wait_operations.extend(targets);
        self.status = OperationStatus::BlockedOnWaitAll;
    }

    pub(crate) fn begin_wait_any(&mut self, targets: impl IntoIterator<Item = SequenceId>) {
        self.wait_operations.clear();
        self.wait_operations.extend(targets);
        self.status = OperationStatus::BlockedOnWaitAny;
    }

    pub(crate) fn begin_wait_resource(&mut self) {
        self.wait_operations.clear();
        self.status = OperationStatus::BlockedOnResource;
    }

    pub(crate) fn add_signal_operation(&mut self, dependent: SequenceId) {
        self.signal_operations.insert(dependent);
    }

    pub(crate) fn remove_signal_operation(&mut self, dependent: SequenceId) {
        self.signal_operations.remove(&dependent);
    }

    /// Re-evaluate a blocked operation, per spec §4.1's `TryEnable`.
    ///
    /// `is_completed` answers whether a given wait target has completed.
    /// Returns `true` if this operation transitioned to `Enabled`.
    pub(crate) fn try_enable(&mut self, mut is_completed: impl FnMut(SequenceId) -> bool) -> bool {
        let became_enabled = match self.status {
            OperationStatus::BlockedOnWaitAll => {
                self.wait_operations.iter().all(|&id| is_completed(id))
            }
            OperationStatus::BlockedOnWaitAny => {
                self.wait_operations.iter().any(|&id| is_completed(id))
            }
            _ => false,
        };

        if became_enabled {
            self.wait_operations.clear();
            self.status = OperationStatus::Enabled;
        }

        became_enabled
    }

    /// `Complete`: finish successfully.
    ///
    /// Returns the set of dependents (`signal_operations`) that must be
    /// re-evaluated via `try_enable`, and clears `signal_operations`.
    pub(crate) fn complete(&mut self) -> Result<SmallVec<[SequenceId; 4]>> {
        self.finish(OperationStatus::Completed)
    }

    /// `Cancel`: finish via cancellation.
    pub(crate) fn cancel(&mut self) -> Result<SmallVec<[SequenceId; 4]>> {
        self.finish(OperationStatus::Canceled)
    }

    fn finish(&mut self, to: OperationStatus) -> Result<SmallVec<[SequenceId; 4]>> {
        if self.status.is_completed() {
            return Err(ctors::operation_already_completed(self.id));
        }

        self.status = to;
        let dependents: SmallVec<[SequenceId; 4]> = self.signal_operations.iter().copied().collect();
        self.signal_operations.clear();
        Ok(dependents)
    }

    /// `Reset`: return a terminal operation to `None`, ready for reuse by a
    /// later iteration with the same externally-visible [`Sid`].
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.status.is_completed());
        self.status = OperationStatus::None;
        self.wait_operations.clear();
        self.signal_operations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(seq: u64) -> Operation {
        Operation::new(Sid::new(), seq.to_string().parse().unwrap())
    }

    #[test]
    fn enable_from_none_succeeds() {
        let mut o = op(1);
        assert_eq!(o.status(), OperationStatus::None);
        o.enable().unwrap();
        assert_eq!(o.status(), OperationStatus::Enabled);
    }

    #[test]
    fn enable_twice_is_already_started() {
        let mut o = op(1);
        o.enable().unwrap();
        let err = o.enable().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::OperationAlreadyStarted);
    }

    #[test]
    fn wait_all_enables_only_when_every_target_completes() {
        let mut o = op(1);
        o.enable().unwrap();
        o.begin_wait_all([SequenceId::first(), SequenceId::first().next()]);
        assert_eq!(o.status(), OperationStatus::BlockedOnWaitAll);

        let first = SequenceId::first();
        let second = first.next();

        assert!(!o.try_enable(|id| id == first));
        assert_eq!(o.status(), OperationStatus::BlockedOnWaitAll);

        assert!(o.try_enable(|id| id == first || id == second));
        assert_eq!(o.status(), OperationStatus::Enabled);
    }

    #[test]
    fn wait_any_enables_when_one_target_completes() {
        let mut o = op(1);
        o.enable().unwrap();
        let first = SequenceId::first();
        let second = first.next();
        o.begin_wait_any([first, second]);

        assert!(!o.try_enable(|_| false));
        assert!(o.try_enable(|id| id == second));
        assert_eq!(o.status(), OperationStatus::Enabled);
    }

    #[test]
    fn complete_returns_and_clears_dependents() {
        let mut o = op(1);
        o.enable().unwrap();
        o.add_signal_operation(SequenceId::first().next());
        o.add_signal_operation(SequenceId::first().next().next());

        let dependents = o.complete().unwrap();
        assert_eq!(dependents.len(), 2);
        assert_eq!(o.status(), OperationStatus::Completed);
        assert_eq!(o.signal_operations().count(), 0);
    }

    #[test]
    fn completing_twice_fails() {
        let mut o = op(1);
        o.enable().unwrap();
        o.complete().unwrap();
        let err = o.complete().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::OperationAlreadyCompleted);
    }

    #[test]
    fn reset_returns_to_none_and_clears_links() {
        let mut o = op(1);
        o.enable().unwrap();
        o.add_signal_operation(SequenceId::first().next());
        o.complete().unwrap();
        o.reset();
        assert_eq!(o.status(), OperationStatus::None);
        assert_eq!(o.signal_operations().count(), 0);
    }
}

/// A table of operations for one scheduler.
///
/// Operations are stored in a [`slab::Slab`] so that handles stay stable and
/// removal (on `Detach`) is O(1); a pair of id indexes map the two handles
/// callers actually use (the remote [`Sid`] and the internal [`SequenceId`])
/// onto slab keys.
pub(crate) struct OperationTable {
    slab: slab::Slab<Operation>,
    by_sid: std::collections::HashMap<Sid, usize>,
    by_sequence: std::collections::HashMap<SequenceId, usize>,
}

impl OperationTable {
    pub(crate) fn new() -> Self {
        Self {
            slab: slab::Slab::new(),
            by_sid: std::collections::HashMap::new(),
            by_sequence: std::collections::HashMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slab.clear();
        self.by_sid.clear();
        self.by_sequence.clear();
    }

    pub(crate) fn insert(&mut self, operation: Operation) -> SequenceId {
        let sequence_id = operation.sequence_id();
        let id = operation.id();
        let key = self.slab.insert(operation);
        self.by_sid.insert(id, key);
        self.by_sequence.insert(sequence_id, key);
        sequence_id
    }

    pub(crate) fn get_by_sid(&self, id: Sid) -> Option<&Operation> {
        let key = *self.by_sid.get(&id)?;
        self.slab.get(key)
    }

    pub(crate) fn get_mut_by_sid(&mut self, id: Sid) -> Option<&mut Operation> {
        let key = *self.by_sid.get(&id)?;
        self.slab.get_mut(key)
    }

    pub(crate) fn get_by_sequence(&self, sequence_id: SequenceId) -> Option<&Operation> {
        let key = *self.by_sequence.get(&sequence_id)?;
        self.slab.get(key)
    }

    pub(crate) fn get_mut_by_sequence(&mut self, sequence_id: SequenceId) -> Option<&mut Operation> {
        let key = *self.by_sequence.get(&sequence_id)?;
        self.slab.get_mut(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.slab.iter().map(|(_, op)| op)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        self.slab.iter_mut().map(|(_, op)| op)
    }

    pub(crate) fn len(&self) -> usize {
        self.slab.len()
    }
}
