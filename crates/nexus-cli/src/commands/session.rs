//! Session commands - health, handshake and ping.

use anyhow::{Result, bail};
use console::Style;
use serde::Serialize;

use nexus_client::TransportConfig;

use super::{Context, heading};

/// Health response for JSON output.
#[derive(Debug, Serialize)]
struct HealthOutput {
    healthy: bool,
    url: Option<String>,
}

/// Run `nexus-client health`.
pub fn health(ctx: &Context) -> Result<()> {
    let client = ctx.connect()?;
    let healthy = client.health_check()?;

    let url = match &ctx.config.transport {
        TransportConfig::Http { url, .. } => Some(url.clone()),
        _ => None,
    };

    if ctx.json_output {
        ctx.print_json(&HealthOutput { healthy, url })?;
    } else {
        let label = if healthy {
            Style::new().green().apply_to("● healthy")
        } else {
            Style::new().red().apply_to("● unreachable")
        };
        println!("{} {}", label, url.unwrap_or_default());
    }

    if !healthy {
        bail!("runtime is not healthy");
    }
    Ok(())
}

/// Run `nexus-client info`.
pub fn info(ctx: &Context) -> Result<()> {
    let client = ctx.connect()?;
    let result = client.initialize(&ctx.config.client_name)?;

    if ctx.json_output {
        return ctx.print_json(&result);
    }

    let dim = Style::new().dim();
    heading("Nexus Runtime");
    println!(
        "  {} {} v{}",
        dim.apply_to("Server:"),
        result.server_info.name,
        result.server_info.version
    );
    println!(
        "  {} {}",
        dim.apply_to("Protocol:"),
        result.protocol_version.as_deref().unwrap_or("unknown")
    );
    println!(
        "  {} {}",
        dim.apply_to("Capabilities:"),
        result.capability_names().join(", ")
    );
    println!("  {} {}", dim.apply_to("Transport:"), client.transport_kind());
    Ok(())
}

/// Run `nexus-client ping`.
pub fn ping(ctx: &Context) -> Result<()> {
    let client = ctx.connect()?;
    let started = std::time::Instant::now();
    let ack = client.ping()?;
    let elapsed = started.elapsed();

    if ctx.json_output {
        ctx.print_json(&serde_json::json!({
            "ack": ack,
            "elapsed_ms": elapsed.as_millis() as u64,
        }))
    } else {
        println!("pong ({} ms)", elapsed.as_millis());
        Ok(())
    }
}
