//! The schedule trace: an ordered, append-only log of scheduling decisions.

use std::fmt::Write as _;

use crate::id::SequenceId;

/// One entry in a [`ScheduleTrace`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TraceEntry {
    /// A scheduling choice — the sequence id of the operation that was run.
    Scheduled(SequenceId),
    /// A nondeterministic boolean choice made via `GetNextBoolean`.
    Boolean(bool),
    /// A nondeterministic integer choice made via `GetNextInteger`.
    Integer(u64),
}

/// An ordered, append-only log of scheduling decisions.
///
/// Serializes to a comma-separated list of decimal `sequenceId`s (spec §3,
/// §6): booleans and integers are recorded alongside scheduling choices for
/// in-memory bookkeeping, but the wire trace format only ever carries
/// `sequenceId`s, matching `GetTrace`'s contract.
#[derive(Default, Debug)]
pub struct ScheduleTrace {
    entries: Vec<TraceEntry>,
}

impl ScheduleTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push_scheduled(&mut self, sequence: SequenceId) {
        self.entries.push(TraceEntry::Scheduled(sequence));
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.entries.push(TraceEntry::Boolean(value));
    }

    pub fn push_integer(&mut self, value: u64) {
        self.entries.push(TraceEntry::Integer(value));
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An iterator over just the scheduling choices, in order.
    pub fn scheduled_sequence_ids(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            TraceEntry::Scheduled(id) => Some(*id),
            _ => None,
        })
    }

    /// Render the wire trace format: comma-separated `sequenceId`s in
    /// decision order. An empty trace serializes to the empty string.
    pub fn to_wire_string(&self) -> String {
        let mut out = String::new();
        for (index, id) in self.scheduled_sequence_ids().enumerate() {
            if index > 0 {
                out.push(',');
            }
            let _ = write!(out, "{id}");
        }
        out
    }

    /// Parse a wire trace (as produced by [`ScheduleTrace::to_wire_string`])
    /// into the sequence of `sequenceId`s it names, for feeding to the
    /// [`Replay`](crate::strategy::operation::Replay) strategy.
    ///
    /// The empty string parses to an empty list. Any other malformed token
    /// (not a positive decimal integer) is rejected — "Replay tolerates no
    /// other tokens" (spec §6).
    pub fn parse_wire_string(trace: &str) -> Result<Vec<SequenceId>, ParseTraceError> {
        if trace.is_empty() {
            return Ok(Vec::new());
        }

        trace
            .split(',')
            .map(|token| {
                token
                    .parse()
                    .map_err(|_| ParseTraceError(token.to_owned()))
            })
            .collect()
    }
}

/// A trace token was not a valid positive decimal sequence id.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid trace token: {0:?}")]
pub struct ParseTraceError(pub String);
