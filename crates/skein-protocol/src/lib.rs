//! Wire message types for the remote controlled-concurrency scheduler
//! protocol (spec §6).
//!
//! This crate is pure data: one `Request`/`Reply` variant per wire method,
//! `#[derive(Serialize, Deserialize)]`, tagged by method name, in the style
//! of `durable_runtime::event::Event`'s small serde structs per message kind.
//! It has no transport dependencies — `skein-server` and `skein-client` both
//! depend on it, but neither depends on the other.
//!
//! [`ErrorCode`] mirrors spec §7's taxonomy table exactly and is the single
//! authoritative projection of [`skein_core::ErrorKind`] onto the wire; the
//! `From` impls in both directions keep the two in lockstep.

use serde::{Deserialize, Serialize};
use skein_core::{ErrorKind, Sid};

/// The wire projection of spec §7's error taxonomy.
///
/// Numeric values are normative (`#[repr(u16)]`) and match the taxonomy
/// table verbatim.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    Failure = 100,
    DeadlockDetected = 101,
    DuplicateOperation = 200,
    NotExistingOperation = 201,
    MainOperationExplicitlyCreated = 202,
    MainOperationExplicitlyStarted = 203,
    MainOperationExplicitlyCompleted = 204,
    OperationNotStarted = 205,
    OperationAlreadyStarted = 206,
    OperationAlreadyCompleted = 207,
    DuplicateResource = 300,
    NotExistingResource = 301,
    ClientAttached = 400,
    ClientNotAttached = 401,
    InternalError = 500,
    SchedulerDisabled = 501,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Failure => ErrorCode::Failure,
            ErrorKind::DeadlockDetected => ErrorCode::DeadlockDetected,
            ErrorKind::DuplicateOperation => ErrorCode::DuplicateOperation,
            ErrorKind::NotExistingOperation => ErrorCode::NotExistingOperation,
            ErrorKind::MainOperationExplicitlyCreated => ErrorCode::MainOperationExplicitlyCreated,
            ErrorKind::MainOperationExplicitlyStarted => ErrorCode::MainOperationExplicitlyStarted,
            ErrorKind::MainOperationExplicitlyCompleted => {
                ErrorCode::MainOperationExplicitlyCompleted
            }
            ErrorKind::OperationNotStarted => ErrorCode::OperationNotStarted,
            ErrorKind::OperationAlreadyStarted => ErrorCode::OperationAlreadyStarted,
            ErrorKind::OperationAlreadyCompleted => ErrorCode::OperationAlreadyCompleted,
            ErrorKind::DuplicateResource => ErrorCode::DuplicateResource,
            ErrorKind::NotExistingResource => ErrorCode::NotExistingResource,
            ErrorKind::ClientAttached => ErrorCode::ClientAttached,
            ErrorKind::ClientNotAttached => ErrorCode::ClientNotAttached,
            ErrorKind::InternalError => ErrorCode::InternalError,
            ErrorKind::SchedulerDisabled => ErrorCode::SchedulerDisabled,
            // `ErrorKind` is `#[non_exhaustive]`; any future variant the core
            // adds surfaces on the wire as an unclassified failure rather
            // than failing to compile here.
            _ => ErrorCode::Failure,
        }
    }
}

/// The `strategyType` field of an `Initialize` request (spec §6).
///
/// Unknown strings fall back to [`StrategyKind::Random`] rather than
/// rejecting the request (spec §6, "Configuration inputs": "unknown
/// strategies fall back to Random") — grounded in the tolerant-parsing style
/// of the teacher's own `TransactionMode` string parsing in
/// `durable_migrate`, which prefers an explicit fallback over a hard
/// failure where the spec allows it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Random,
    Probabilistic,
    Pct,
    FairPct,
    Replay,
}

impl StrategyKind {
    /// Parse a `strategyType` string, falling back to [`StrategyKind::Random`]
    /// and logging a warning on anything unrecognized. Never fails.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "random" => StrategyKind::Random,
            "probabilistic" => StrategyKind::Probabilistic,
            "pct" => StrategyKind::Pct,
            "fairpct" => StrategyKind::FairPct,
            "replay" => StrategyKind::Replay,
            other => {
                tracing::warn!(strategy_type = other, "unknown strategy type, falling back to random");
                StrategyKind::Random
            }
        }
    }
}

/// One request envelope per wire method (spec §6's table).
///
/// Every variant carries the `schedulerId` field the spec requires on every
/// request, plus that method's additional fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    /// The one request variant with no `schedulerId`: the server allocates a
    /// fresh session id and returns it in the reply (spec §6's table lists
    /// `schedulerId` only among `Initialize`'s *reply* fields).
    Initialize {
        strategy_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
    Attach {
        scheduler_id: Sid,
    },
    Detach {
        scheduler_id: Sid,
    },
    CreateOperation {
        scheduler_id: Sid,
        operation_id: Sid,
    },
    StartOperation {
        scheduler_id: Sid,
        operation_id: Sid,
    },
    WaitOperation {
        scheduler_id: Sid,
        operation_id: Sid,
    },
    CompleteOperation {
        scheduler_id: Sid,
        operation_id: Sid,
    },
    CreateResource {
        scheduler_id: Sid,
        resource_id: Sid,
    },
    DeleteResource {
        scheduler_id: Sid,
        resource_id: Sid,
    },
    WaitResource {
        scheduler_id: Sid,
        resource_id: Sid,
    },
    SignalOperation {
        scheduler_id: Sid,
        resource_id: Sid,
        operation_id: Sid,
    },
    SignalOperations {
        scheduler_id: Sid,
        resource_id: Sid,
    },
    ScheduleNext {
        scheduler_id: Sid,
    },
    GetNextBoolean {
        scheduler_id: Sid,
    },
    GetNextInteger {
        scheduler_id: Sid,
        max_value: u64,
    },
    GetTrace {
        scheduler_id: Sid,
    },
}

impl Request {
    /// The `schedulerId` carried by every request variant except
    /// `Initialize`, which has none yet (the server allocates it).
    pub fn scheduler_id(&self) -> Option<Sid> {
        let id = match self {
            Request::Initialize { .. } => return None,
            Request::Attach { scheduler_id }
            | Request::Detach { scheduler_id }
            | Request::CreateOperation { scheduler_id, .. }
            | Request::StartOperation { scheduler_id, .. }
            | Request::WaitOperation { scheduler_id, .. }
            | Request::CompleteOperation { scheduler_id, .. }
            | Request::CreateResource { scheduler_id, .. }
            | Request::DeleteResource { scheduler_id, .. }
            | Request::WaitResource { scheduler_id, .. }
            | Request::SignalOperation { scheduler_id, .. }
            | Request::SignalOperations { scheduler_id, .. }
            | Request::ScheduleNext { scheduler_id }
            | Request::GetNextBoolean { scheduler_id }
            | Request::GetNextInteger { scheduler_id, .. }
            | Request::GetTrace { scheduler_id } => *scheduler_id,
        };
        Some(id)
    }
}

/// One reply envelope per wire method (spec §6's table).
///
/// `error_code` is present on every reply; the remaining fields are whatever
/// that method's row in spec §6 names.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub error_code: ErrorCode,
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl Reply {
    pub fn ok(body: ReplyBody) -> Self {
        Self {
            error_code: ErrorCode::Success,
            body,
        }
    }

    pub fn err(code: ErrorCode) -> Self {
        Self {
            error_code: code,
            body: ReplyBody::Empty,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyBody {
    Empty,
    SchedulerId {
        scheduler_id: Sid,
    },
    Attached {
        iteration: u64,
        main_operation_id: Sid,
    },
    NextOperation {
        next_operation_id: Sid,
    },
    Boolean {
        value: bool,
    },
    Integer {
        value: u64,
    },
    Trace {
        trace: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let request = Request::WaitOperation {
            scheduler_id: Sid::new(),
            operation_id: Sid::new(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(request.scheduler_id(), parsed.scheduler_id());
    }

    #[test]
    fn unknown_strategy_type_falls_back_to_random() {
        assert_eq!(StrategyKind::parse("not-a-real-strategy"), StrategyKind::Random);
        assert_eq!(StrategyKind::parse("PCT"), StrategyKind::Pct);
    }

    #[test]
    fn error_code_values_match_taxonomy_table() {
        assert_eq!(ErrorCode::DeadlockDetected.code(), 101);
        assert_eq!(ErrorCode::ClientAttached.code(), 400);
        assert_eq!(ErrorCode::SchedulerDisabled.code(), 501);
    }

    #[test]
    fn reply_serializes_error_code_and_body_together() {
        let reply = Reply::ok(ReplyBody::NextOperation {
            next_operation_id: Sid::NIL,
        });
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["errorCode"], 0);
        assert!(json["nextOperationId"].is_string());
    }
}
