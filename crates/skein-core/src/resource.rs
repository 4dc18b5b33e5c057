//! Resources: named synchronization points operations can wait on (spec §3,
//! §4.2).

use std::collections::BTreeSet;

use crate::error::{ctors, Result};
use crate::id::{SequenceId, Sid};

/// A named synchronization point.
///
/// Tracks the set of operations registered to be notified on signal. The
/// scheduler is responsible for actually transitioning a waiter's status —
/// `Resource` only tracks membership, the same split of responsibility as
/// [`crate::operation::Operation`] versus [`crate::scheduler::Scheduler`].
pub struct Resource {
    id: Sid,
    waiters: BTreeSet<SequenceId>,
}

impl Resource {
    pub(crate) fn new(id: Sid) -> Self {
        Self {
            id,
            waiters: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> Sid {
        self.id
    }

    pub fn waiters(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.waiters.iter().copied()
    }

    /// `Register`: add `op` to the waiter set.
    pub(crate) fn register(&mut self, op: SequenceId) {
        self.waiters.insert(op);
    }

    /// `Signal`: remove `op` from the waiter set if present. Returns whether
    /// it was actually a waiter (a no-op signal on a non-waiter is not an
    /// error per spec §4.2).
    pub(crate) fn signal_one(&mut self, op: SequenceId) -> bool {
        self.waiters.remove(&op)
    }

    /// `SignalAll`: clear the waiter set, returning everyone who was waiting.
    pub(crate) fn signal_all(&mut self) -> BTreeSet<SequenceId> {
        std::mem::take(&mut self.waiters)
    }
}

/// A table of resources for one scheduler, keyed by [`Sid`].
pub(crate) struct ResourceTable {
    resources: std::collections::HashMap<Sid, Resource>,
}

impl ResourceTable {
    pub(crate) fn new() -> Self {
        Self {
            resources: std::collections::HashMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.resources.clear();
    }

    pub(crate) fn create(&mut self, id: Sid) -> Result<()> {
        if self.resources.contains_key(&id) {
            return Err(ctors::duplicate_resource(id));
        }

        self.resources.insert(id, Resource::new(id));
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: Sid) -> Option<Resource> {
        self.resources.remove(&id)
    }

    pub(crate) fn get(&self, id: Sid) -> Result<&Resource> {
        self.resources
            .get(&id)
            .ok_or_else(|| ctors::not_existing_resource(id))
    }

    pub(crate) fn get_mut(&mut self, id: Sid) -> Result<&mut Resource> {
        self.resources
            .get_mut(&id)
            .ok_or_else(|| ctors::not_existing_resource(id))
    }
}
