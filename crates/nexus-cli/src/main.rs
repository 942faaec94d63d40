//! nexus-client - command-line client for the Nexus tool runtime
//!
//! Main entry point for the CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::Style;

use nexus_client::{ClientConfig, load_config, load_config_file};

mod commands;

use commands::{memory, resources, session, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// nexus-client - talk to a Nexus tool runtime
#[derive(Parser)]
#[command(name = "nexus-client")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(short, long, global = true, env = "NEXUS_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Runtime base URL; selects the HTTP transport
    #[arg(long, global = true, env = "NEXUS_URL")]
    pub url: Option<String>,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the runtime's health endpoint
    Health,

    /// Perform the handshake and show the server identity
    Info,

    /// Send a protocol ping
    Ping,

    /// List available tools
    Tools,

    /// Call a tool
    Call(tools::CallArgs),

    /// List available resources
    Resources,

    /// Read a resource by URI
    Read(resources::ReadArgs),

    /// Persistent key-value memory
    Memory(memory::MemoryArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    if let Err(e) = run(cli) {
        let red = Style::new().red();
        eprintln!("{} {:#}", red.apply_to("error:"), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    let ctx = commands::Context {
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Health => session::health(&ctx),
        Commands::Info => session::info(&ctx),
        Commands::Ping => session::ping(&ctx),
        Commands::Tools => tools::list(&ctx),
        Commands::Call(args) => tools::call(args, &ctx),
        Commands::Resources => resources::list(&ctx),
        Commands::Read(args) => resources::read(args, &ctx),
        Commands::Memory(args) => memory::run(args, &ctx),
    }
}

/// Console logging to stderr, plus an optional JSON log file.
fn init_logging(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_filter = if cli.verbose {
        "nexus_client=debug,nexus_cli=debug,info"
    } else {
        "nexus_client=warn,nexus_cli=info,warn"
    };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            let appender = tracing_appender::rolling::never(
                dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
                name,
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("nexus_client=trace,nexus_cli=trace,info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

/// Explicit file, else discovered layers; `--url` overrides the transport.
fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let loaded = load_config(None).context("failed to load configuration")?;
            for warning in &loaded.warnings {
                tracing::warn!("{}", warning);
            }
            for path in loaded.loaded_from() {
                tracing::debug!(path = %path.display(), "using config");
            }
            loaded.config
        }
    };

    if let Some(url) = &cli.url {
        config.transport = ClientConfig::http(url.clone()).transport;
    }

    Ok(config)
}
