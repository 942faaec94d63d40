//! Out-of-process transport: one runtime invocation per tool call.
//!
//! The runtime binary is run as
//! `<binary> run <tool> --args <json> --format json`; a zero exit status
//! means the structured tool result is on standard output, anything else
//! is a failure described on standard error.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::{DEFAULT_TIMEOUT, Transport, TransportKind};
use crate::error::{NexusError, Result};
use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse, methods};

/// Default runtime binary, resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "nexus";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the process transport.
#[derive(Debug, Clone)]
pub struct ProcessTransportConfig {
    /// Runtime binary to invoke.
    pub binary: String,
    /// Environment variables to set on each invocation.
    pub env: Vec<(String, String)>,
    /// Working directory for each invocation.
    pub working_dir: Option<PathBuf>,
    /// How long one invocation may run before it is killed.
    pub timeout: Duration,
}

impl Default for ProcessTransportConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            env: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProcessTransportConfig {
    /// Create a config for the given binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured result of one invocation.
#[derive(Debug)]
struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Transport that runs the runtime binary once per call.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    config: ProcessTransportConfig,
}

impl ProcessTransport {
    /// Create a process transport. Nothing is spawned until a call is made.
    pub fn new(config: ProcessTransportConfig) -> Self {
        tracing::info!(binary = %config.binary, "created process transport");
        Self { config }
    }

    /// The binary this transport invokes.
    pub fn binary(&self) -> &str {
        &self.config.binary
    }

    fn call_tool(&self, request: &JsonRpcRequest) -> Result<Vec<u8>> {
        let params: CallToolParams = request
            .params
            .clone()
            .ok_or_else(|| NexusError::protocol("tools/call request without params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| {
                    NexusError::protocol(format!("malformed tools/call params: {}", e))
                })
            })?;

        let args = serde_json::to_string(&params.arguments)?;
        let captured = self.run(&["run", &params.name, "--args", &args, "--format", "json"])?;

        if !captured.status.success() {
            let stderr = String::from_utf8_lossy(&captured.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                format!("tool '{}' failed", params.name)
            } else {
                stderr
            };
            return Err(NexusError::ProcessFailed {
                status: captured.status.code(),
                stderr,
            });
        }

        let result: Value = serde_json::from_slice(&captured.stdout)
            .map_err(|e| NexusError::transport(format!("unreadable tool output: {}", e)))?;

        JsonRpcResponse::success(request.id, result).to_bytes()
    }

    fn run(&self, args: &[&str]) -> Result<Captured> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(binary = %self.config.binary, ?args, "invoking runtime");

        let mut child = cmd.spawn().map_err(|e| {
            NexusError::spawn_failed(format!("failed to spawn '{}': {}", self.config.binary, e))
        })?;

        wait_with_timeout(&mut child, self.config.timeout)
    }
}

impl Transport for ProcessTransport {
    fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let request = JsonRpcRequest::from_slice(payload)?;
        match request.method.as_str() {
            methods::TOOLS_CALL => self.call_tool(&request),
            other => Err(NexusError::unsupported(other, TransportKind::Process)),
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }
}

/// Drain both output pipes while waiting, killing the child at the deadline.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Captured> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(NexusError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Captured {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| NexusError::transport("output reader panicked"))?
            .map_err(NexusError::from),
        None => Ok(Vec::new()),
    }
}
