//! Stdio transport: a long-lived runtime child speaking JSON-RPC.
//!
//! The runtime's `--stdio` mode reads one request per line and writes one
//! response per line. Content-Length framing is also supported for
//! servers that use it:
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! {"jsonrpc": "2.0", "id": 1, "method": "...", "params": {...}}
//! ```

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{DEFAULT_TIMEOUT, Transport, TransportKind};
use crate::error::{NexusError, Result};

/// How messages are delimited on the child's streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON document per line.
    #[default]
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// Configuration for the stdio transport.
#[derive(Debug, Clone)]
pub struct StdioTransportConfig {
    /// Command to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
    /// Message framing.
    pub framing: Framing,
    /// How long to wait for each response.
    pub timeout: Duration,
}

impl StdioTransportConfig {
    /// Create a config for the given command with line framing.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            framing: Framing::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the framing.
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Set the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport over a child process's stdin/stdout.
pub struct StdioTransport {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    frames: Receiver<Result<Vec<u8>>>,
    framing: Framing,
    timeout: Duration,
}

impl StdioTransport {
    /// Spawn the child and start reading its output.
    pub fn spawn(config: StdioTransportConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            NexusError::spawn_failed(format!("failed to spawn '{}': {}", config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NexusError::spawn_failed("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NexusError::spawn_failed("failed to capture stdout"))?;

        let (tx, frames) = mpsc::channel();
        let framing = config.framing;
        thread::Builder::new()
            .name("nexus-stdio-reader".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    match read_frame(&mut reader, framing) {
                        Ok(Some(frame)) => {
                            if tx.send(Ok(frame)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })?;

        tracing::info!(
            command = %config.command,
            framing = ?config.framing,
            "spawned stdio transport"
        );

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            frames,
            framing: config.framing,
            timeout: config.timeout,
        })
    }
}

impl Transport for StdioTransport {
    fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        write_frame(&mut self.stdin, self.framing, payload).map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => NexusError::ConnectionClosed,
            _ => NexusError::Io(e),
        })?;

        tracing::trace!(json = %String::from_utf8_lossy(payload), "sent stdio message");

        // Ids only grow, so a lower id is the answer to an abandoned request.
        let awaited = message_id(payload);
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match self.frames.recv_timeout(remaining) {
                Ok(frame) => frame?,
                Err(RecvTimeoutError::Timeout) => return Err(NexusError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(NexusError::ConnectionClosed),
            };
            tracing::trace!(json = %String::from_utf8_lossy(&frame), "received stdio message");

            match (awaited, message_id(&frame)) {
                (Some(expected), Some(actual)) if actual < expected => {
                    tracing::warn!(expected, actual, "discarding late stdio response");
                }
                _ => return Ok(frame),
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn shutdown(&mut self) -> Result<()> {
        let _ = self.child.kill();
        let _ = self.child.wait();
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[derive(Deserialize)]
struct MessageId {
    #[serde(default)]
    id: Option<u64>,
}

/// Numeric id of a JSON-RPC message, if it has one.
fn message_id(bytes: &[u8]) -> Option<u64> {
    serde_json::from_slice::<MessageId>(bytes).ok()?.id
}

/// Write one framed message and flush.
pub fn write_frame<W: Write>(writer: &mut W, framing: Framing, payload: &[u8]) -> std::io::Result<()> {
    match framing {
        Framing::Line => {
            writer.write_all(payload)?;
            writer.write_all(b"\n")?;
        }
        Framing::ContentLength => {
            write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
            writer.write_all(payload)?;
        }
    }
    writer.flush()
}

/// Read one framed message. Returns `None` at end of stream.
pub fn read_frame<R: BufRead>(reader: &mut R, framing: Framing) -> Result<Option<Vec<u8>>> {
    match framing {
        Framing::Line => read_line_frame(reader),
        Framing::ContentLength => read_content_length_frame(reader),
    }
}

fn read_line_frame<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.as_bytes().to_vec()));
        }
    }
}

fn read_content_length_frame<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();

        // Empty line ends the header block
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(len_str.trim().parse().map_err(|e| {
                NexusError::transport(format!("invalid Content-Length: {}", e))
            })?);
        }
    }

    let content_length =
        content_length.ok_or_else(|| NexusError::transport("missing Content-Length header"))?;

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_framing() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Framing::Line, br#"{"id":1}"#).unwrap();
        write_frame(&mut buf, Framing::Line, br#"{"id":2}"#).unwrap();
        assert_eq!(buf, b"{\"id\":1}\n{\"id\":2}\n");

        let mut reader = Cursor::new(b"\n{\"id\":1}\r\n\n{\"id\":2}\n".to_vec());
        assert_eq!(
            read_frame(&mut reader, Framing::Line).unwrap(),
            Some(br#"{"id":1}"#.to_vec())
        );
        assert_eq!(
            read_frame(&mut reader, Framing::Line).unwrap(),
            Some(br#"{"id":2}"#.to_vec())
        );
        assert_eq!(read_frame(&mut reader, Framing::Line).unwrap(), None);
    }

    #[test]
    fn test_content_length_framing() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Framing::ContentLength, br#"{"id":1}"#).unwrap();
        assert_eq!(buf, b"Content-Length: 8\r\n\r\n{\"id\":1}");

        let mut reader = Cursor::new(buf);
        assert_eq!(
            read_frame(&mut reader, Framing::ContentLength).unwrap(),
            Some(br#"{"id":1}"#.to_vec())
        );
        assert_eq!(read_frame(&mut reader, Framing::ContentLength).unwrap(), None);
    }

    #[test]
    fn test_invalid_content_length() {
        let mut reader = Cursor::new(b"Content-Length: abc\r\n\r\n{}".to_vec());
        let err = read_frame(&mut reader, Framing::ContentLength).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_truncated_body() {
        let mut reader = Cursor::new(b"Content-Length: 50\r\n\r\n{}".to_vec());
        let err = read_frame(&mut reader, Framing::ContentLength).unwrap_err();
        assert!(matches!(err, NexusError::Io(_)));
    }

    #[test]
    fn test_message_id() {
        assert_eq!(message_id(br#"{"jsonrpc":"2.0","id":7,"result":{}}"#), Some(7));
        assert_eq!(message_id(br#"{"jsonrpc":"2.0","id":"seven"}"#), None);
        assert_eq!(message_id(br#"{"jsonrpc":"2.0","method":"ping"}"#), None);
        assert_eq!(message_id(b"<<not json>>"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_late_response_is_discarded() {
        // The child replays an answer for id 1 before echoing the request.
        let script = r#"read -r line
echo '{"jsonrpc":"2.0","id":1,"result":{}}'
echo "$line""#;
        let mut transport = StdioTransport::spawn(
            StdioTransportConfig::new("sh")
                .with_arg("-c")
                .with_arg(script)
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        let request = br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#;
        assert_eq!(transport.send(request).unwrap(), request);
    }

    #[test]
    fn test_config_builder() {
        let config = StdioTransportConfig::new("nexus")
            .with_arg("--stdio")
            .with_env_var("RUST_LOG", "warn")
            .with_framing(Framing::ContentLength)
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.command, "nexus");
        assert_eq!(config.args, vec!["--stdio"]);
        assert_eq!(config.framing, Framing::ContentLength);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_spawn_nonexistent_command() {
        let result = StdioTransport::spawn(StdioTransportConfig::new("nonexistent-nexus-12345"));
        match result {
            Ok(_) => panic!("Expected spawn to fail"),
            Err(err) => assert!(matches!(err, NexusError::SpawnFailed(_))),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cat_echoes_frames() {
        // `cat` writes back whatever it reads, which is enough to exercise
        // the writer, the reader thread and shutdown.
        let mut transport = StdioTransport::spawn(StdioTransportConfig::new("cat")).unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.send(br#"{"id":1}"#).unwrap(), br#"{"id":1}"#);
        transport.shutdown().unwrap();
        assert!(!transport.is_connected());
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_child_reports_closed() {
        let mut transport = StdioTransport::spawn(StdioTransportConfig::new("true")).unwrap();
        let err = transport.send(br#"{"id":1}"#).unwrap_err();
        assert!(err.is_transport());
    }
}
