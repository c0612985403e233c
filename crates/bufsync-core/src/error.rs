//! Error types for bufsync.
//!
//! Every fallible operation in the crate returns [`BufsyncError`]. Host
//! failures are wrapped as-is in [`BufsyncError::HostCallFailed`]; nothing is
//! retried automatically.

use thiserror::Error;

/// Main error type for the bufsync library.
#[derive(Debug, Error)]
pub enum BufsyncError {
    // Codec errors
    #[error("Unsupported encoding: {encoding}")]
    UnsupportedEncoding { encoding: String },

    #[error("Unsupported fileformat: {format} (expected unix, dos or mac)")]
    UnsupportedFileFormat { format: String },

    #[error("Content is not representable in {encoding}")]
    Unrepresentable { encoding: String },

    // Host errors
    #[error("Failed to open buffer {name:?}: {reason}")]
    BufferOpenFailed { name: String, reason: String },

    #[error("Host call {call} failed: {message}")]
    HostCallFailed { call: String, message: String },

    // Guard errors
    #[error("Failed to restore {guard} state: {source}")]
    RestoreFailed {
        guard: &'static str,
        #[source]
        source: Box<BufsyncError>,
    },

    #[error("{error} (restoring {guard} state also failed: {restore})")]
    GuardFailed {
        guard: &'static str,
        #[source]
        error: Box<BufsyncError>,
        restore: Box<BufsyncError>,
    },

    // Argument errors
    #[error("Unknown flag '{flag}' is specified.")]
    UnknownFlag { flag: String },

    #[error("Unknown option '{option}' is specified.")]
    UnknownOption { option: String },

    // Transport errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Connection to host at {addr} lost")]
    ConnectionLost { addr: String },

    #[error("Host call {call} timed out after {seconds}s")]
    Timeout { call: String, seconds: u64 },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },
}

/// Result type alias for bufsync operations.
pub type Result<T> = std::result::Result<T, BufsyncError>;

impl From<std::io::Error> for BufsyncError {
    fn from(err: std::io::Error) -> Self {
        BufsyncError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BufsyncError {
    fn from(err: serde_json::Error) -> Self {
        BufsyncError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BufsyncError {
    /// Create a host call error.
    pub fn host(call: impl Into<String>, message: impl Into<String>) -> Self {
        BufsyncError::HostCallFailed {
            call: call.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Host call failed / connection lost / timed out
    /// - -32001: Buffer open failed
    /// - -32002: Encoding or fileformat error
    /// - -32003: Guard restore failed
    /// - -32005: Invalid arguments
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            BufsyncError::HostCallFailed { .. }
            | BufsyncError::ConnectionLost { .. }
            | BufsyncError::Timeout { .. } => -32000,

            BufsyncError::BufferOpenFailed { .. } => -32001,

            BufsyncError::UnsupportedEncoding { .. }
            | BufsyncError::UnsupportedFileFormat { .. }
            | BufsyncError::Unrepresentable { .. } => -32002,

            BufsyncError::RestoreFailed { .. } | BufsyncError::GuardFailed { .. } => -32003,

            BufsyncError::UnknownFlag { .. } | BufsyncError::UnknownOption { .. } => -32005,

            BufsyncError::Json { .. } => -32700,
            BufsyncError::Protocol { .. } => -32600,
            BufsyncError::MethodNotFound { .. } => -32601,

            _ => -32603,
        }
    }

    /// Message sent over the wire. Host errors travel without the local
    /// call prefix so the client can re-wrap them under its own method name.
    pub fn rpc_message(&self) -> String {
        match self {
            BufsyncError::HostCallFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The error a guarded body produced, looking through restore failures.
    pub fn primary(&self) -> &BufsyncError {
        match self {
            BufsyncError::GuardFailed { error, .. } => error.primary(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = BufsyncError::UnsupportedEncoding {
            encoding: "klingon".into(),
        };
        assert_eq!(err.to_string(), "Unsupported encoding: klingon");

        let err = BufsyncError::UnknownFlag {
            flag: "--foo".into(),
        };
        assert_eq!(err.to_string(), "Unknown flag '--foo' is specified.");

        let err = BufsyncError::Timeout {
            call: "get_lines".into(),
            seconds: 30,
        };
        assert_eq!(err.to_string(), "Host call get_lines timed out after 30s");
        assert_eq!(err.to_rpc_error_code(), -32000);
    }

    #[test]
    fn test_guard_failed_keeps_both_errors() {
        let err = BufsyncError::GuardFailed {
            guard: "modifiable",
            error: Box::new(BufsyncError::host("setline", "E21: Cannot make changes")),
            restore: Box::new(BufsyncError::host("set_var", "E94: No matching buffer")),
        };
        let message = err.to_string();
        assert!(message.contains("E21"));
        assert!(message.contains("E94"));
        assert!(err.source().unwrap().to_string().contains("E21"));
        assert!(matches!(
            err.primary(),
            BufsyncError::HostCallFailed { call, .. } if call == "setline"
        ));
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(BufsyncError::host("bufnr", "boom").to_rpc_error_code(), -32000);
        assert_eq!(
            BufsyncError::UnknownFlag { flag: "-x".into() }.to_rpc_error_code(),
            -32005
        );
        assert_eq!(
            BufsyncError::Protocol {
                message: "bad".into()
            }
            .to_rpc_error_code(),
            -32600
        );
        assert_eq!(
            BufsyncError::MethodNotFound {
                method: "nope".into()
            }
            .to_rpc_error_code(),
            -32601
        );
    }

    #[test]
    fn test_rpc_message_strips_call_prefix() {
        let err = BufsyncError::host("execute", "E492: Not an editor command");
        assert_eq!(err.rpc_message(), "E492: Not an editor command");
        assert!(err.to_string().starts_with("Host call execute failed"));
    }
}
