//! Error types for Nexus client operations.
//!
//! Variants fall into four classes: transport (the remote could not be
//! reached or its bytes could not be read), protocol (the envelope was
//! malformed or out of order), tool (the remote reported an error) and
//! decode (a result did not have the shape a caller expected).

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportKind;

/// Result type for Nexus client operations.
pub type Result<T> = std::result::Result<T, NexusError>;

/// Error type for Nexus client operations.
#[derive(Debug, Error)]
pub enum NexusError {
    /// Failed to launch the runtime process.
    #[error("failed to spawn runtime: {0}")]
    SpawnFailed(String),

    /// Failed to deliver a request or read its response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The runtime process exited unsuccessfully.
    #[error("runtime exited with {}: {stderr}", exit_label(.status))]
    ProcessFailed {
        /// Exit code, if the process was not killed by a signal.
        status: Option<i32>,
        /// Captured diagnostic stream.
        stderr: String,
    },

    /// The HTTP endpoint answered with a non-success status.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The connection to the runtime was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// No response arrived within the configured timeout.
    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport cannot carry this operation.
    #[error("{operation} is not supported by the {transport} transport")]
    Unsupported {
        /// The method or operation that was attempted.
        operation: String,
        /// The transport that refused it.
        transport: TransportKind,
    },

    /// The response envelope violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The response identifier did not match the awaited request.
    #[error("response id {actual} does not match request id {expected}")]
    IdMismatch {
        /// Identifier of the request in flight.
        expected: u64,
        /// Identifier carried by the response.
        actual: u64,
    },

    /// The session has not completed its handshake.
    #[error("session not initialized - call initialize() first")]
    NotInitialized,

    /// The runtime reported an error for the call.
    #[error("tool error {code}: {message}")]
    Tool {
        /// Error code from the runtime.
        code: i64,
        /// Error message from the runtime.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// A result did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tool arguments were not a mapping.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no exit status".to_string(),
    }
}

impl NexusError {
    /// Create a spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a tool error from a remote error descriptor.
    pub fn tool(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::Tool {
            code,
            message: message.into(),
            data,
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>, transport: TransportKind) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            transport,
        }
    }

    /// Whether the request could not be delivered or its response not read.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed(_)
                | Self::Transport(_)
                | Self::ProcessFailed { .. }
                | Self::Http { .. }
                | Self::ConnectionClosed
                | Self::Timeout(_)
                | Self::Io(_)
                | Self::Unsupported { .. }
        )
    }

    /// Whether the envelope or session violated the protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::IdMismatch { .. } | Self::NotInitialized
        )
    }

    /// Whether the runtime reported an error.
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    /// Whether a result failed to decode into the expected shape.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NexusError::spawn_failed("command not found");
        assert!(err.to_string().contains("spawn"));
        assert!(err.to_string().contains("command not found"));

        let err = NexusError::tool(-32601, "Method not found: foo", None);
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("Method not found"));

        let err = NexusError::ProcessFailed {
            status: Some(1),
            stderr: "error: path not allowed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "runtime exited with status 1: error: path not allowed"
        );

        let err = NexusError::ProcessFailed {
            status: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("no exit status"));
    }

    #[test]
    fn test_classification() {
        assert!(NexusError::transport("down").is_transport());
        assert!(NexusError::ConnectionClosed.is_transport());
        assert!(NexusError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(NexusError::unsupported("ping", TransportKind::Process).is_transport());

        let mismatch = NexusError::IdMismatch {
            expected: 1,
            actual: 2,
        };
        assert!(mismatch.is_protocol());
        assert!(!mismatch.is_transport());

        let tool = NexusError::tool(-32000, "path not allowed", None);
        assert!(tool.is_tool());
        assert!(!tool.is_transport());
        assert!(!tool.is_protocol());

        assert!(NexusError::decode("missing keys").is_decode());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: NexusError = json_err.into();
        assert!(matches!(err, NexusError::Json(_)));
        assert!(err.is_decode());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: NexusError = io_err.into();
        assert!(matches!(err, NexusError::Io(_)));
        assert!(err.is_transport());
    }
}
