use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by scan commands.
///
/// Decoding, classification and merging never produce one of these; they
/// degrade to default field values instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No compatible radio adapter present")]
    RadioUnavailable,
    #[error("Bluetooth is not powered on")]
    RadioOff,
    #[error("Not authorized to use Bluetooth")]
    RadioUnauthorized,
    #[error("Operation not supported by this radio")]
    RadioUnsupported,
    #[error("Radio did not become ready within {0:?}")]
    ReadinessTimeout(Duration),
    #[error("Activity not available")]
    NoHostContext,
    #[error("Scan registration failed: {0}")]
    RegistrationFailed(String),
    #[error("Scan request was cancelled")]
    Cancelled,
    #[error("Scan session is no longer running")]
    SessionClosed,
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Error {
    pub fn from_string(message: String) -> Self {
        Error::InternalError(message)
    }

    /// Stable error code reported to the host alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::RadioUnavailable => "NO_SCANNER",
            Error::RadioOff => "BLUETOOTH_OFF",
            Error::RadioUnauthorized => "UNAUTHORIZED",
            Error::RadioUnsupported => "UNSUPPORTED",
            Error::ReadinessTimeout(_) => "READINESS_TIMEOUT",
            Error::NoHostContext => "NO_ACTIVITY",
            Error::RegistrationFailed(_) => "SCAN_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::SessionClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::SessionClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_host_contract() {
        assert_eq!(Error::RadioOff.code(), "BLUETOOTH_OFF");
        assert_eq!(Error::NoHostContext.code(), "NO_ACTIVITY");
        assert_eq!(
            Error::ReadinessTimeout(Duration::from_secs(2)).code(),
            "READINESS_TIMEOUT"
        );
    }

    #[test]
    fn test_from_string_is_internal() {
        let err = Error::from_string("boom".to_string());
        assert_eq!(err, Error::InternalError("boom".to_string()));
        assert_eq!(err.to_string(), "Internal error: boom");
    }
}
