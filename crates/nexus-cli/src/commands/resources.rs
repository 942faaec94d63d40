//! Resource commands.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::{Context, heading};

/// Arguments for `nexus-client read`.
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Resource URI, e.g. `nexus://kv`
    pub uri: String,
}

/// Run `nexus-client resources`.
pub fn list(ctx: &Context) -> Result<()> {
    let client = ctx.connect_ready()?;
    let resources = client.list_resources()?;

    if ctx.json_output {
        return ctx.print_json(&resources);
    }

    let dim = Style::new().dim();
    heading("Resources");
    if resources.is_empty() {
        println!("{}", dim.apply_to("No resources available"));
    }
    for resource in &resources {
        println!("  {}  {}", style(&resource.uri).cyan(), resource.name);
    }
    Ok(())
}

/// Run `nexus-client read`.
pub fn read(args: ReadArgs, ctx: &Context) -> Result<()> {
    let client = ctx.connect_ready()?;
    let contents = client.read_resource(&args.uri)?;

    if ctx.json_output {
        return ctx.print_json(&contents);
    }

    let dim = Style::new().dim();
    for item in &contents.contents {
        match (&item.text, &item.blob) {
            (Some(text), _) => println!("{}", text),
            (None, Some(blob)) => println!(
                "{}",
                dim.apply_to(format!("[binary: {} bytes base64]", blob.len()))
            ),
            (None, None) => println!("{}", dim.apply_to("[empty]")),
        }
    }
    Ok(())
}
