//! Handshake state for one continuous interaction with the runtime.

use std::fmt;

use serde_json::{Map, Value};

use crate::protocol::{InitializeResult, ServerInfo};

/// Handshake phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake has been attempted, or the last one failed.
    #[default]
    Uninitialized,
    /// An `initialize` request is in flight.
    Initializing,
    /// The handshake completed.
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

/// Session state, server identity and negotiated capabilities.
///
/// Mutated only by the handshake. There is no closed state: the session
/// ends when the transport does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    state: SessionState,
    client_name: Option<String>,
    server_info: Option<ServerInfo>,
    protocol_version: Option<String>,
    capabilities: Map<String, Value>,
}

impl Session {
    /// Current handshake phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake completed.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Name the client announced in the handshake.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Server identity, once ready.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Protocol version reported by the server, if any.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Capabilities the server advertised.
    pub fn capabilities(&self) -> &Map<String, Value> {
        &self.capabilities
    }

    /// Whether the server advertised a capability.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// The handshake result, once ready.
    pub fn handshake(&self) -> Option<InitializeResult> {
        let server_info = self.server_info.clone()?;
        Some(InitializeResult {
            protocol_version: self.protocol_version.clone(),
            server_info,
            capabilities: self.capabilities.clone(),
        })
    }

    pub(crate) fn begin_handshake(&mut self, client_name: &str) {
        self.state = SessionState::Initializing;
        self.client_name = Some(client_name.to_string());
    }

    pub(crate) fn complete_handshake(&mut self, result: &InitializeResult) {
        self.state = SessionState::Ready;
        self.server_info = Some(result.server_info.clone());
        self.protocol_version = result.protocol_version.clone();
        self.capabilities = result.capabilities.clone();
    }

    pub(crate) fn fail_handshake(&mut self) {
        *self = Self::default();
    }
}
