//! The scheduler's error taxonomy.
//!
//! [`SchedulerError`] is an opaque wrapper around [`ErrorData`] in the style
//! of `durable_migrate::Error` — callers match on [`SchedulerError::kind`]
//! rather than the hidden variants, so new failure modes can be added without
//! breaking downstream matches.

use crate::id::Sid;

/// The taxonomy of scheduler failures, as surfaced to callers.
///
/// This is the authoritative list of "what can go wrong"; the wire-level
/// error codes in `skein-protocol` are a 1:1 projection of this enum.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// An unclassified failure.
    Failure,
    /// `ScheduleNext` found no enabled operation while uncompleted operations
    /// remain.
    DeadlockDetected,
    /// `CreateOperation` was called with an id already live and non-terminal.
    DuplicateOperation,
    /// An operation method was called with an id not present in the table.
    NotExistingOperation,
    /// `CreateOperation` was called explicitly with the main operation id.
    MainOperationExplicitlyCreated,
    /// `StartOperation` was called explicitly with the main operation id.
    MainOperationExplicitlyStarted,
    /// `CompleteOperation` was called explicitly with the main operation id.
    MainOperationExplicitlyCompleted,
    /// Wait or Complete was called before the operation was started.
    OperationNotStarted,
    /// `StartOperation` was called twice.
    OperationAlreadyStarted,
    /// Start, Wait, or Complete was called after the operation completed.
    OperationAlreadyCompleted,
    /// `CreateResource` was called with an id already live.
    DuplicateResource,
    /// A resource method was called with an id not present in the table.
    NotExistingResource,
    /// `Attach` was called while already attached.
    ClientAttached,
    /// An operation method was called while not attached.
    ClientNotAttached,
    /// An internal invariant was violated.
    InternalError,
    /// The scheduler is disabled following a fatal error; only `Detach` is
    /// permitted until it is cleared.
    SchedulerDisabled,
}

impl ErrorKind {
    /// The wire error code assigned to this kind, per the taxonomy table.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::Failure => 100,
            ErrorKind::DeadlockDetected => 101,
            ErrorKind::DuplicateOperation => 200,
            ErrorKind::NotExistingOperation => 201,
            ErrorKind::MainOperationExplicitlyCreated => 202,
            ErrorKind::MainOperationExplicitlyStarted => 203,
            ErrorKind::MainOperationExplicitlyCompleted => 204,
            ErrorKind::OperationNotStarted => 205,
            ErrorKind::OperationAlreadyStarted => 206,
            ErrorKind::OperationAlreadyCompleted => 207,
            ErrorKind::DuplicateResource => 300,
            ErrorKind::NotExistingResource => 301,
            ErrorKind::ClientAttached => 400,
            ErrorKind::ClientNotAttached => 401,
            ErrorKind::InternalError => 500,
            ErrorKind::SchedulerDisabled => 501,
        }
    }

    /// Whether an error of this kind puts the scheduler into the permanent
    /// `SchedulerDisabled` state (spec §7: "A 500 or 101 puts the scheduler
    /// into the terminal state").
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::InternalError | ErrorKind::DeadlockDetected)
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SchedulerError(ErrorData);

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            ErrorData::Failure(_) => ErrorKind::Failure,
            ErrorData::DeadlockDetected => ErrorKind::DeadlockDetected,
            ErrorData::DuplicateOperation(_) => ErrorKind::DuplicateOperation,
            ErrorData::NotExistingOperation(_) => ErrorKind::NotExistingOperation,
            ErrorData::MainOperationExplicitlyCreated => ErrorKind::MainOperationExplicitlyCreated,
            ErrorData::MainOperationExplicitlyStarted => ErrorKind::MainOperationExplicitlyStarted,
            ErrorData::MainOperationExplicitlyCompleted => {
                ErrorKind::MainOperationExplicitlyCompleted
            }
            ErrorData::OperationNotStarted(_) => ErrorKind::OperationNotStarted,
            ErrorData::OperationAlreadyStarted(_) => ErrorKind::OperationAlreadyStarted,
            ErrorData::OperationAlreadyCompleted(_) => ErrorKind::OperationAlreadyCompleted,
            ErrorData::DuplicateResource(_) => ErrorKind::DuplicateResource,
            ErrorData::NotExistingResource(_) => ErrorKind::NotExistingResource,
            ErrorData::ClientAttached => ErrorKind::ClientAttached,
            ErrorData::ClientNotAttached => ErrorKind::ClientNotAttached,
            ErrorData::InternalError(_) => ErrorKind::InternalError,
            ErrorData::SchedulerDisabled => ErrorKind::SchedulerDisabled,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorData {
    #[error("{0}")]
    Failure(String),
    #[error("deadlock detected: no operation is enabled but uncompleted operations remain")]
    DeadlockDetected,
    #[error("operation {0} already exists and is not in a terminal state")]
    DuplicateOperation(Sid),
    #[error("no operation with id {0}")]
    NotExistingOperation(Sid),
    #[error("the main operation cannot be created explicitly")]
    MainOperationExplicitlyCreated,
    #[error("the main operation cannot be started explicitly")]
    MainOperationExplicitlyStarted,
    #[error("the main operation cannot be completed explicitly")]
    MainOperationExplicitlyCompleted,
    #[error("operation {0} has not been started")]
    OperationNotStarted(Sid),
    #[error("operation {0} has already been started")]
    OperationAlreadyStarted(Sid),
    #[error("operation {0} has already completed")]
    OperationAlreadyCompleted(Sid),
    #[error("resource {0} already exists")]
    DuplicateResource(Sid),
    #[error("no resource with id {0}")]
    NotExistingResource(Sid),
    #[error("a client is already attached to this scheduler")]
    ClientAttached,
    #[error("no client is attached to this scheduler")]
    ClientNotAttached,
    #[error("internal scheduler invariant violated: {0}")]
    InternalError(String),
    #[error("the scheduler is disabled following a fatal error; call Detach to recover")]
    SchedulerDisabled,
}

impl From<ErrorData> for SchedulerError {
    fn from(data: ErrorData) -> Self {
        Self(data)
    }
}

macro_rules! ctor {
    ($name:ident, $variant:ident) => {
        pub(crate) fn $name() -> SchedulerError {
            ErrorData::$variant.into()
        }
    };
    ($name:ident, $variant:ident($arg:ty)) => {
        pub(crate) fn $name(value: $arg) -> SchedulerError {
            ErrorData::$variant(value.into()).into()
        }
    };
}

pub(crate) mod ctors {
    use super::{ErrorData, SchedulerError};
    use crate::id::Sid;

    ctor!(failure, Failure(String));
    ctor!(deadlock_detected, DeadlockDetected);
    ctor!(duplicate_operation, DuplicateOperation(Sid));
    ctor!(not_existing_operation, NotExistingOperation(Sid));
    ctor!(main_operation_explicitly_created, MainOperationExplicitlyCreated);
    ctor!(main_operation_explicitly_started, MainOperationExplicitlyStarted);
    ctor!(main_operation_explicitly_completed, MainOperationExplicitlyCompleted);
    ctor!(operation_not_started, OperationNotStarted(Sid));
    ctor!(operation_already_started, OperationAlreadyStarted(Sid));
    ctor!(operation_already_completed, OperationAlreadyCompleted(Sid));
    ctor!(duplicate_resource, DuplicateResource(Sid));
    ctor!(not_existing_resource, NotExistingResource(Sid));
    ctor!(client_attached, ClientAttached);
    ctor!(client_not_attached, ClientNotAttached);
    ctor!(internal_error, InternalError(String));
    ctor!(scheduler_disabled, SchedulerDisabled);
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
