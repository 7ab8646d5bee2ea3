use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for rumor seed and peer nodes
#[derive(Debug)]
pub enum RumorError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Connect/send/receive failures, including timeouts
    Transport(String),

    /// Malformed wire messages
    Codec(CodecError),

    /// Registry store failures on the seed
    Registry(String),

    /// HTTP API errors
    Api(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Controller task gone or response channel dropped
    Concurrency(String),
}

/// Wire message parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Message does not start with a known kind prefix
    UnknownKind(String),

    /// A required field is absent
    MissingField(&'static str),

    /// Port field is not a valid u16
    InvalidPort(String),

    /// Timestamp field is not an integer
    InvalidTimestamp(String),

    /// Host field is empty or contains a separator
    InvalidHost(String),

    /// Frame is not valid UTF-8 text
    NotText,
}

impl fmt::Display for RumorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RumorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RumorError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RumorError::Codec(err) => write!(f, "Codec error: {}", err),
            RumorError::Registry(msg) => write!(f, "Registry error: {}", msg),
            RumorError::Api(msg) => write!(f, "API error: {}", msg),
            RumorError::Io(err) => write!(f, "I/O error: {}", err),
            RumorError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnknownKind(msg) => write!(f, "unknown message kind: {:?}", msg),
            CodecError::MissingField(field) => write!(f, "missing field: {}", field),
            CodecError::InvalidPort(port) => write!(f, "invalid port: {:?}", port),
            CodecError::InvalidTimestamp(ts) => write!(f, "invalid timestamp: {:?}", ts),
            CodecError::InvalidHost(host) => write!(f, "invalid host: {:?}", host),
            CodecError::NotText => write!(f, "frame is not valid UTF-8"),
        }
    }
}

impl std::error::Error for RumorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RumorError::Io(err) => Some(err),
            RumorError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for CodecError {}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, RumorError>;

impl IntoResponse for RumorError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl RumorError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RumorError::Config(_) => StatusCode::BAD_REQUEST,
            RumorError::Codec(_) => StatusCode::BAD_REQUEST,
            RumorError::Api(_) => StatusCode::BAD_REQUEST,
            RumorError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            RumorError::Concurrency(_) => StatusCode::SERVICE_UNAVAILABLE,
            RumorError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RumorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            RumorError::Config(_) => "configuration_error",
            RumorError::Transport(_) => "transport_error",
            RumorError::Codec(_) => "codec_error",
            RumorError::Registry(_) => "registry_error",
            RumorError::Api(_) => "api_error",
            RumorError::Io(_) => "io_error",
            RumorError::Concurrency(_) => "concurrency_error",
        }
    }
}

impl From<std::io::Error> for RumorError {
    fn from(err: std::io::Error) -> Self {
        RumorError::Io(err)
    }
}

impl From<CodecError> for RumorError {
    fn from(err: CodecError) -> Self {
        RumorError::Codec(err)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RumorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RumorError::Concurrency("controller channel closed".to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for RumorError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        RumorError::Concurrency("controller dropped response channel".to_string())
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::RumorError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RumorError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::RumorError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RumorError::Transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! registry_error {
    ($msg:expr) => {
        $crate::error::RumorError::Registry($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RumorError::Registry(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! api_error {
    ($msg:expr) => {
        $crate::error::RumorError::Api($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RumorError::Api(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = RumorError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let codec_err: RumorError = CodecError::InvalidPort("abc".to_string()).into();
        assert_eq!(codec_err.to_string(), "Codec error: invalid port: \"abc\"");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let rumor_err: RumorError = io_err.into();

        assert!(matches!(rumor_err, RumorError::Io(_)));
        assert_eq!(rumor_err.error_type(), "io_error");
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 0);
        assert_eq!(err.to_string(), "Configuration error: Port 0 is invalid");

        let err = transport_error!("connection refused");
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
