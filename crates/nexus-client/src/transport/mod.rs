//! Transport layer for Nexus communication.
//!
//! A transport takes an encoded request envelope and returns the encoded
//! response. Three realizations are provided:
//!
//! - [`HttpTransport`]: POST to the runtime's `/mcp` endpoint, with a
//!   `/health` probe outside the envelope.
//! - [`ProcessTransport`]: one-shot `nexus run <tool>` invocations that
//!   capture standard output.
//! - [`StdioTransport`]: a long-lived `nexus --stdio` child speaking
//!   JSON-RPC over its standard streams.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, Result};

pub mod http;
pub mod process;
pub mod stdio;

pub use http::{HttpTransport, HttpTransportConfig};
pub use process::{ProcessTransport, ProcessTransportConfig};
pub use stdio::{Framing, StdioTransport, StdioTransportConfig};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which realization a transport is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP POST to a fixed endpoint.
    Http,
    /// One-shot child process per call.
    Process,
    /// Long-lived child process over stdin/stdout.
    Stdio,
    /// A caller-provided implementation.
    Custom,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Http => "http",
            Self::Process => "process",
            Self::Stdio => "stdio",
            Self::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// Delivers encoded requests to the runtime.
///
/// Implementations are driven by one caller at a time; the client holds
/// its transport behind a lock.
pub trait Transport: Send {
    /// Deliver an encoded request and return the encoded response.
    fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Which realization this is.
    fn kind(&self) -> TransportKind;

    /// Liveness probe outside the protocol envelope.
    fn health(&mut self) -> Result<bool> {
        Err(NexusError::unsupported("health probe", self.kind()))
    }

    /// Release any process or connection held by the transport.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check if the transport can still carry requests.
    fn is_connected(&mut self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).send(payload)
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn health(&mut self) -> Result<bool> {
        (**self).health()
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }

    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }
}
