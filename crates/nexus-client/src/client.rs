//! Nexus client: envelope round trips, handshake and liveness.

use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{ClientConfig, TransportConfig};
use crate::correlator::RequestCorrelator;
use crate::error::{NexusError, Result};
use crate::memory::{Memory, MemoryTools};
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, decode_result, methods,
};
use crate::session::{Session, SessionState};
use crate::transport::{
    HttpTransport, HttpTransportConfig, ProcessTransport, ProcessTransportConfig, StdioTransport,
    StdioTransportConfig, Transport, TransportKind,
};

/// Default client name announced during the handshake.
pub const DEFAULT_CLIENT_NAME: &str = "nexus-client";

/// A client bound to one runtime through one transport.
///
/// Every call blocks until the transport returns. The client is `Sync`:
/// callers on several threads share one session and are serialized at the
/// transport, while the correlator keeps each response matched to its
/// request.
pub struct NexusClient {
    name: String,
    transport: Mutex<Box<dyn Transport>>,
    kind: TransportKind,
    correlator: RequestCorrelator,
    session: Mutex<Session>,
    require_handshake: bool,
    memory_tools: MemoryTools,
}

impl NexusClient {
    /// Connect using the transport described by a configuration.
    ///
    /// This does NOT perform the handshake - call `initialize()` when the
    /// transport supports it.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.timeout();
        let transport: Box<dyn Transport> = match &config.transport {
            TransportConfig::Http {
                url,
                headers,
                retries,
            } => {
                let mut http = HttpTransportConfig::new(url)
                    .with_timeout(timeout)
                    .with_retries(*retries);
                for [key, value] in headers {
                    http = http.with_header(key, value);
                }
                Box::new(HttpTransport::connect(http)?)
            }
            TransportConfig::Process {
                binary,
                env,
                working_dir,
            } => {
                let mut process = ProcessTransportConfig::new(binary).with_timeout(timeout);
                for [key, value] in env {
                    process = process.with_env_var(key, value);
                }
                if let Some(dir) = working_dir {
                    process = process.with_working_dir(dir);
                }
                Box::new(ProcessTransport::new(process))
            }
            TransportConfig::Stdio {
                command,
                args,
                env,
                framing,
            } => {
                let mut stdio = StdioTransportConfig::new(command)
                    .with_framing(*framing)
                    .with_timeout(timeout);
                for arg in args {
                    stdio = stdio.with_arg(arg);
                }
                for [key, value] in env {
                    stdio = stdio.with_env_var(key, value);
                }
                Box::new(StdioTransport::spawn(stdio)?)
            }
        };

        Ok(Self::with_transport(transport)
            .with_name(config.client_name.clone())
            .with_handshake_required(config.require_handshake)
            .with_memory_tools(config.memory.clone()))
    }

    /// Wrap an existing transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        let kind = transport.kind();
        Self {
            name: DEFAULT_CLIENT_NAME.to_string(),
            transport: Mutex::new(Box::new(transport)),
            kind,
            correlator: RequestCorrelator::new(),
            session: Mutex::new(Session::default()),
            require_handshake: false,
            memory_tools: MemoryTools::default(),
        }
    }

    /// Set the default client name reported by `name()`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Refuse calls other than `initialize` and `ping` until the session is ready.
    pub fn with_handshake_required(mut self, required: bool) -> Self {
        self.require_handshake = required;
        self
    }

    /// Override the tool names used by the memory facade.
    pub fn with_memory_tools(mut self, tools: MemoryTools) -> Self {
        self.memory_tools = tools;
        self
    }

    /// Get the client name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Which transport the client uses.
    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    /// Snapshot of the session.
    pub fn session(&self) -> Session {
        self.session.lock().clone()
    }

    /// Check if the handshake completed.
    pub fn is_ready(&self) -> bool {
        self.session.lock().is_ready()
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.correlator.in_flight()
    }

    /// The memory facade over this client.
    pub fn memory(&self) -> Memory<'_> {
        Memory::with_tools(self, self.memory_tools.clone())
    }

    /// Send a request and return its result payload.
    ///
    /// Error descriptors from the runtime surface as `NexusError::Tool`.
    pub fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.require_handshake
            && method != methods::INITIALIZE
            && method != methods::PING
            && !self.is_ready()
        {
            return Err(NexusError::NotInitialized);
        }
        self.round_trip(method, params)
    }

    fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let in_flight = self.correlator.begin(method)?;
        let request = JsonRpcRequest::new(in_flight.id(), method, params);
        let payload = request.to_bytes()?;

        let raw = {
            let mut transport = self.transport.lock();
            transport.send(&payload)?
        };

        let response = JsonRpcResponse::from_slice(&raw)?;
        let pending = in_flight.complete(response.id)?;

        tracing::trace!(
            method = %pending.method,
            id = pending.id,
            elapsed_ms = pending.elapsed().as_millis() as u64,
            "request completed"
        );

        response.into_result().map_err(NexusError::from)
    }

    /// Perform the handshake, announcing the client under `client_name`.
    ///
    /// Once the session is ready, later calls return the recorded
    /// handshake without contacting the runtime, and `client_name` is
    /// ignored: the session keeps the name it was established under (see
    /// [`Session::client_name`]).
    pub fn initialize(&self, client_name: &str) -> Result<InitializeResult> {
        {
            let mut session = self.session.lock();
            if let Some(handshake) = session.handshake() {
                if session.client_name() != Some(client_name) {
                    tracing::warn!(
                        established = session.client_name().unwrap_or_default(),
                        requested = %client_name,
                        "session already initialized; keeping the established client name"
                    );
                }
                return Ok(handshake);
            }
            session.begin_handshake(client_name);
        }

        let outcome = serde_json::to_value(InitializeParams::new(client_name))
            .map_err(NexusError::from)
            .and_then(|params| self.round_trip(methods::INITIALIZE, Some(params)))
            .and_then(|value| {
                serde_json::from_value::<InitializeResult>(value).map_err(|e| {
                    NexusError::protocol(format!("malformed initialize result: {}", e))
                })
            });

        let mut session = self.session.lock();
        match outcome {
            Ok(result) => {
                tracing::info!(
                    server = %result.server_info.name,
                    version = %result.server_info.version,
                    protocol = result.protocol_version.as_deref().unwrap_or("unknown"),
                    "session initialized"
                );
                session.complete_handshake(&result);
                Ok(result)
            }
            Err(e) => {
                session.fail_handshake();
                Err(e)
            }
        }
    }

    /// Current handshake phase.
    pub fn state(&self) -> SessionState {
        self.session.lock().state()
    }

    /// Liveness check through the protocol. Valid in any session state.
    pub fn ping(&self) -> Result<Value> {
        self.request(methods::PING, None)
    }

    /// Liveness probe outside the protocol envelope (HTTP only).
    pub fn health_check(&self) -> Result<bool> {
        self.transport.lock().health()
    }

    /// Decode a method result into its typed shape.
    pub(crate) fn request_typed<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let value = self.request(method, params)?;
        decode_result(method, value)
    }

    /// Shutdown the transport.
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!(transport = %self.kind, "shutting down Nexus client");
        self.transport.lock().shutdown()
    }

    /// Check if the transport is still usable.
    pub fn is_connected(&self) -> bool {
        self.transport.lock().is_connected()
    }
}

impl Drop for NexusClient {
    fn drop(&mut self) {
        let _ = self.transport.get_mut().shutdown();
    }
}
