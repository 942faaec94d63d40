//! Client configuration and config file discovery.
//!
//! Resolution order (later overrides earlier, per top-level key):
//! 1. `<config dir>/nexus/client.toml` (user config)
//! 2. `./nexus-client.toml` (project-local)
//!
//! ```toml
//! client_name = "nexus-client"
//! require_handshake = false
//! timeout_secs = 30
//!
//! [transport]
//! kind = "http"
//! url = "http://localhost:9000"
//!
//! [memory]
//! store_tool = "memory.store"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_CLIENT_NAME;
use crate::error::{NexusError, Result};
use crate::memory::MemoryTools;
use crate::transport::process::DEFAULT_BINARY;
use crate::transport::{DEFAULT_TIMEOUT, Framing, TransportKind};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "nexus-client.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "client.toml";

/// Directory name under the platform config directory.
const APP_NAME: &str = "nexus";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "NEXUS_CLIENT_CONFIG_DIR";

/// Default base URL of the runtime's HTTP server.
pub const DEFAULT_URL: &str = "http://localhost:9000";

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name announced in the handshake.
    pub client_name: String,
    /// Refuse calls other than `initialize`/`ping` before the handshake.
    pub require_handshake: bool,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// How to reach the runtime.
    pub transport: TransportConfig,
    /// Tool names backing the memory facade.
    pub memory: MemoryTools,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            require_handshake: false,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            transport: TransportConfig::default(),
            memory: MemoryTools::default(),
        }
    }
}

impl ClientConfig {
    /// HTTP configuration for the given base URL.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Http {
                url: url.into(),
                headers: Vec::new(),
                retries: 0,
            },
            ..Default::default()
        }
    }

    /// One-shot process configuration for the given runtime binary.
    pub fn process(binary: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Process {
                binary: binary.into(),
                env: Vec::new(),
                working_dir: None,
            },
            ..Default::default()
        }
    }

    /// Stdio configuration running `<command> --stdio`.
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Stdio {
                command: command.into(),
                args: vec!["--stdio".to_string()],
                env: Vec::new(),
                framing: Framing::Line,
            },
            ..Default::default()
        }
    }

    /// Parse a config from TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| NexusError::Config(e.to_string()))
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NexusError::Config(e.to_string()))
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject configurations no transport can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(NexusError::Config("timeout_secs must be positive".into()));
        }
        match &self.transport {
            TransportConfig::Http { url, .. } if url.trim().is_empty() => {
                Err(NexusError::Config("transport.url must not be empty".into()))
            }
            TransportConfig::Process { binary, .. } if binary.trim().is_empty() => {
                Err(NexusError::Config("transport.binary must not be empty".into()))
            }
            TransportConfig::Stdio { command, .. } if command.trim().is_empty() => {
                Err(NexusError::Config("transport.command must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Transport section, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// POST to `{url}/mcp`.
    Http {
        /// Base URL of the runtime.
        #[serde(default = "default_url")]
        url: String,
        /// Extra `[name, value]` headers.
        #[serde(default)]
        headers: Vec<[String; 2]>,
        /// Retries after a failed delivery.
        #[serde(default)]
        retries: u32,
    },
    /// `<binary> run <tool> ...` per call.
    Process {
        /// Runtime binary.
        #[serde(default = "default_binary")]
        binary: String,
        /// Extra `[name, value]` environment variables.
        #[serde(default)]
        env: Vec<[String; 2]>,
        /// Working directory for each invocation.
        #[serde(default)]
        working_dir: Option<PathBuf>,
    },
    /// Long-lived child over stdin/stdout.
    Stdio {
        /// Command to spawn.
        #[serde(default = "default_binary")]
        command: String,
        /// Arguments to the command.
        #[serde(default = "default_stdio_args")]
        args: Vec<String>,
        /// Extra `[name, value]` environment variables.
        #[serde(default)]
        env: Vec<[String; 2]>,
        /// Message framing.
        #[serde(default)]
        framing: Framing,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Http {
            url: default_url(),
            headers: Vec::new(),
            retries: 0,
        }
    }
}

impl TransportConfig {
    /// Which transport this section selects.
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Http { .. } => TransportKind::Http,
            Self::Process { .. } => TransportKind::Process,
            Self::Stdio { .. } => TransportKind::Stdio,
        }
    }
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_stdio_args() -> Vec<String> {
    vec!["--stdio".to_string()]
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: ClientConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings for layers that could not be used.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `NEXUS_CLIENT_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut merged = toml::Table::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_path {
        sources.push(load_layer(&mut merged, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut merged, &project_path, &mut warnings));

    let config: ClientConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| NexusError::Config(e.to_string()))?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| NexusError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    let config = ClientConfig::from_toml(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Path of the user config file.
///
/// Checks `NEXUS_CLIENT_CONFIG_DIR` first, then the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join(USER_CONFIG_FILE));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME).join(USER_CONFIG_FILE))
}

/// Read one layer and overlay its top-level keys onto `merged`.
///
/// A layer that cannot be read or parsed is skipped with a warning.
fn load_layer(merged: &mut toml::Table, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let not_loaded = || ConfigSource {
        path: path.to_path_buf(),
        loaded: false,
    };

    if !path.is_file() {
        return not_loaded();
    }

    let layer = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| contents.parse::<toml::Table>().map_err(|e| e.to_string()))
        .and_then(|table| {
            // Check the layer on its own so a bad file is reported against its path.
            toml::Value::Table(table.clone())
                .try_into::<ClientConfig>()
                .map(|_| table)
                .map_err(|e| e.to_string())
        });

    match layer {
        Ok(table) => {
            for (key, value) in table {
                merged.insert(key, value);
            }
            tracing::debug!(path = %path.display(), "loaded config layer");
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            not_loaded()
        }
    }
}
