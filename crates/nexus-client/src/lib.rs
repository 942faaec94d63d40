//! Protocol client for the Nexus tool runtime.
//!
//! This crate speaks JSON-RPC 2.0 to a Nexus runtime, keeps the handshake
//! state of one session, and layers typed tool invocation, resource reads
//! and a persistent key-value memory on top of plain tool calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Memory / BestEffortMemory                                  │
//! │  - store / recall / list over memory.* tools                │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  NexusClient                                                │
//! │  - initialize, ping, tools/*, resources/*                   │
//! │  - RequestCorrelator + Session                              │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport                                                  │
//! │  - HTTP (POST /mcp), one-shot process, stdio child          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use nexus_client::{ClientConfig, NexusClient};
//! use serde_json::json;
//!
//! let client = NexusClient::connect(&ClientConfig::http("http://localhost:9000"))?;
//! let server = client.initialize("my-agent")?;
//! println!("Connected to: {} v{}", server.server_info.name, server.server_info.version);
//!
//! let echoed = client.call_text("echo", json!({"text": "hello"}))?;
//! assert_eq!(echoed, "hello");
//!
//! let memory = client.memory();
//! memory.store("visit_count", "1")?;
//! assert_eq!(memory.recall("visit_count")?, Some("1".to_string()));
//!
//! // Treat lookup failures as "I don't remember".
//! let remembered = client.memory().best_effort().recall("user:color");
//! ```

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod resources;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export main types
pub use client::{DEFAULT_CLIENT_NAME, NexusClient};
pub use config::{ClientConfig, LoadedConfig, TransportConfig, load_config, load_config_file};
pub use correlator::{PendingRequest, RequestCorrelator};
pub use error::{NexusError, Result};
pub use memory::{BestEffortMemory, Memory, MemoryTools};
pub use protocol::{
    CallToolResult, ContentItem, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ResourceContent, ResourceContents, ResourceDescriptor, ServerInfo, ToolInfo,
};
pub use session::{Session, SessionState};
pub use transport::{
    Framing, HttpTransport, HttpTransportConfig, ProcessTransport, ProcessTransportConfig,
    StdioTransport, StdioTransportConfig, Transport, TransportKind,
};
