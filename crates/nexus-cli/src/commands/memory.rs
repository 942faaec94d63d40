//! Memory command - persistent key-value memory.
//!
//! Lookups are best-effort unless `--strict` is given: a failed recall
//! prints as "not found" and a failed listing as empty. A failed store is
//! always reported with its cause.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the memory command.
#[derive(Args, Debug)]
pub struct MemoryArgs {
    /// Propagate lookup failures instead of treating them as absent
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Store a value under a key
    Store {
        /// Key, e.g. `user:color`
        key: String,

        /// Value to store
        value: String,

        /// Expire the entry after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Recall the value stored under a key
    Recall {
        /// Key to look up
        key: String,
    },

    /// List stored keys
    List {
        /// Only keys starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
}

/// Recall response for JSON output.
#[derive(Debug, Serialize)]
struct RecallOutput<'a> {
    key: &'a str,
    found: bool,
    value: Option<String>,
}

/// Run the memory command.
pub fn run(args: MemoryArgs, ctx: &Context) -> Result<()> {
    match args.command {
        MemoryCommand::Store { key, value, ttl } => cmd_store(&key, &value, ttl, ctx),
        MemoryCommand::Recall { key } => cmd_recall(&key, args.strict, ctx),
        MemoryCommand::List { prefix } => cmd_list(prefix.as_deref(), args.strict, ctx),
    }
}

fn cmd_store(key: &str, value: &str, ttl: Option<u64>, ctx: &Context) -> Result<()> {
    let client = ctx.connect_for_calls()?;
    let memory = client.memory();

    match ttl {
        Some(secs) => memory.store_with_ttl(key, value, Duration::from_secs(secs)),
        None => memory.store(key, value),
    }
    .with_context(|| format!("failed to store '{}'", key))?;

    if ctx.json_output {
        ctx.print_json(&serde_json::json!({ "key": key, "stored": true }))
    } else {
        println!("{} {}", Style::new().green().apply_to("stored"), key);
        Ok(())
    }
}

fn cmd_recall(key: &str, strict: bool, ctx: &Context) -> Result<()> {
    let client = ctx.connect_for_calls()?;
    let memory = client.memory();

    let value = if strict {
        memory.recall(key)?
    } else {
        memory.best_effort().recall(key)
    };

    if ctx.json_output {
        return ctx.print_json(&RecallOutput {
            key,
            found: value.is_some(),
            value,
        });
    }

    match value {
        Some(value) => println!("{}", value),
        None => println!("{}", Style::new().dim().apply_to("(not found)")),
    }
    Ok(())
}

fn cmd_list(prefix: Option<&str>, strict: bool, ctx: &Context) -> Result<()> {
    let client = ctx.connect_for_calls()?;
    let memory = client.memory();

    let keys = if strict {
        memory.list(prefix)?
    } else {
        memory.best_effort().list(prefix)
    };

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({ "keys": keys, "count": keys.len() }));
    }

    if keys.is_empty() {
        println!("{}", Style::new().dim().apply_to("(no keys)"));
    }
    for key in &keys {
        println!("{}", style(key).cyan());
    }
    Ok(())
}
