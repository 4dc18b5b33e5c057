//! Opaque 128-bit identifiers shared by sessions, operations, and resources.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A 128-bit opaque identifier.
///
/// Used interchangeably for scheduler (session) ids, operation ids, and
/// resource ids — the data model treats all three as the same kind of handle,
/// distinguished only by which table they key into.
///
/// [`Sid::NIL`] is the distinguished "no operation" sentinel referenced
/// throughout the scheduler: `ScheduleNext` returns it when nothing is
/// enabled, and it is never a valid id for a real operation or resource.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Sid(Uuid);

impl Sid {
    /// The all-zero sentinel representing "no operation".
    pub const NIL: Sid = Sid(Uuid::nil());

    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Whether this is the [`Sid::NIL`] sentinel.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Sid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

impl From<Uuid> for Sid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<Sid> for Uuid {
    fn from(value: Sid) -> Self {
        value.0
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Sid;

    impl Serialize for Sid {
        fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
            self.0.serialize(ser)
        }
    }

    impl<'de> Deserialize<'de> for Sid {
        fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
            Ok(Sid(uuid::Uuid::deserialize(de)?))
        }
    }
}

/// The stable, monotonically-increasing key assigned to an operation when it
/// is first created within a session.
///
/// Sequence ids are what strategies and the schedule trace actually operate
/// on — they are stable across an operation's lifetime (including `Reset`)
/// within one iteration, whereas the operation's [`Sid`] is supplied by the
/// remote caller and is only meaningful to it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SequenceId(std::num::NonZeroU64);

impl SequenceId {
    pub(crate) fn first() -> Self {
        // SAFETY: 1 is non-zero.
        Self(std::num::NonZeroU64::new(1).unwrap())
    }

    pub(crate) fn next(self) -> Self {
        Self(
            std::num::NonZeroU64::new(self.0.get() + 1)
                .expect("sequence id counter overflowed u64"),
        )
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing a [`SequenceId`] from trace text fails.
#[derive(Copy, Clone, Debug, thiserror::Error)]
pub enum ParseSequenceIdError {
    #[error("expected a decimal integer: {0}")]
    NotANumber(#[from] std::num::ParseIntError),
    #[error("sequence ids are 1-based, got 0")]
    Zero,
}

impl FromStr for SequenceId {
    type Err = ParseSequenceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s.parse()?;
        std::num::NonZeroU64::new(value)
            .map(Self)
            .ok_or(ParseSequenceIdError::Zero)
    }
}
