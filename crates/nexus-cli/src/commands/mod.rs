//! CLI command handlers.

use anyhow::{Context as _, Result};
use console::Style;
use serde::Serialize;

use nexus_client::{ClientConfig, NexusClient};

pub mod memory;
pub mod resources;
pub mod session;
pub mod tools;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved client configuration.
    pub config: ClientConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open a client over the configured transport.
    pub fn connect(&self) -> Result<NexusClient> {
        let kind = self.config.transport.kind();
        if self.verbose {
            let dim = Style::new().dim();
            eprintln!("{}", dim.apply_to(format!("Connecting via {} transport", kind)));
        }
        NexusClient::connect(&self.config)
            .with_context(|| format!("failed to connect via {} transport", kind))
    }

    /// Open a client and complete the handshake.
    pub fn connect_ready(&self) -> Result<NexusClient> {
        let client = self.connect()?;
        client
            .initialize(&self.config.client_name)
            .context("handshake failed")?;
        Ok(client)
    }

    /// Open a client for tool calls, completing the handshake first when
    /// the config gates calls on it.
    pub fn connect_for_calls(&self) -> Result<NexusClient> {
        if self.config.require_handshake {
            self.connect_ready()
        } else {
            self.connect()
        }
    }

    /// Print a value as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Print a bold heading with a rule under it.
pub fn heading(title: &str) {
    let dim = Style::new().dim();
    println!("{}", console::style(title).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
}
