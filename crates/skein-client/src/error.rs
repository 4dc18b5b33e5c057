//! The client's error type: transport failures plus the scheduler's own
//! wire taxonomy (spec §7), in the style of `durable_client::DurableError`
//! — an opaque wrapper with a `kind()` accessor rather than a public enum.

use skein_protocol::ErrorCode;

pub struct ClientError(pub(crate) ErrorImpl);

#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClientErrorKind {
    /// The connection to the scheduler failed or was lost.
    Io,
    /// A reply could not be decoded as JSON.
    Protocol,
    /// The scheduler itself rejected the request; see the wrapped
    /// [`ErrorCode`].
    Scheduler,
}

pub(crate) enum ErrorImpl {
    Io(std::io::Error),
    Protocol(serde_json::Error),
    Scheduler(ErrorCode),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match &self.0 {
            ErrorImpl::Io(_) => ClientErrorKind::Io,
            ErrorImpl::Protocol(_) => ClientErrorKind::Protocol,
            ErrorImpl::Scheduler(_) => ClientErrorKind::Scheduler,
        }
    }

    /// The wire error code, if this error originated from the scheduler
    /// rejecting the request rather than from a transport failure.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.0 {
            ErrorImpl::Scheduler(code) => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            ErrorImpl::Io(e) => write!(f, "transport error: {e}"),
            ErrorImpl::Protocol(e) => write!(f, "malformed reply: {e}"),
            ErrorImpl::Scheduler(code) => write!(f, "scheduler rejected the request: {code:?}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            ErrorImpl::Io(e) => Some(e),
            ErrorImpl::Protocol(e) => Some(e),
            ErrorImpl::Scheduler(_) => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        Self(ErrorImpl::Io(error))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self(ErrorImpl::Protocol(error))
    }
}

pub(crate) fn scheduler_error(code: ErrorCode) -> ClientError {
    ClientError(ErrorImpl::Scheduler(code))
}

pub type Result<T> = std::result::Result<T, ClientError>;
