//! Tool commands - list and call tools.

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use serde_json::Value;

use nexus_client::ContentItem;

use super::{Context, heading};

/// Arguments for `nexus-client call`.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name, e.g. `echo` or `memory.recall`
    pub tool: String,

    /// Tool arguments as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub args: String,

    /// Print only the first text item
    #[arg(long)]
    pub text: bool,
}

/// Run `nexus-client tools`.
pub fn list(ctx: &Context) -> Result<()> {
    let client = ctx.connect_ready()?;
    let tools = client.list_tools()?;

    if ctx.json_output {
        return ctx.print_json(&tools);
    }

    let dim = Style::new().dim();
    heading("Tools");
    if tools.is_empty() {
        println!("{}", dim.apply_to("No tools available"));
    }
    for tool in &tools {
        match &tool.description {
            Some(desc) => println!("  {}  {}", style(&tool.name).cyan(), dim.apply_to(desc)),
            None => println!("  {}", style(&tool.name).cyan()),
        }
    }
    Ok(())
}

/// Run `nexus-client call`.
pub fn call(args: CallArgs, ctx: &Context) -> Result<()> {
    let arguments: Value = serde_json::from_str(&args.args)
        .with_context(|| format!("invalid JSON arguments: {}", args.args))?;

    let client = ctx.connect_for_calls()?;

    if args.text {
        let text = client.call_text(&args.tool, arguments)?;
        if ctx.json_output {
            return ctx.print_json(&serde_json::json!({ "text": text }));
        }
        println!("{}", text);
        return Ok(());
    }

    let result = client.call_tool(&args.tool, arguments)?;
    if ctx.json_output {
        return ctx.print_json(&result);
    }

    let dim = Style::new().dim();
    for item in &result.content {
        match item {
            ContentItem::Text { text } => println!("{}", text),
            ContentItem::Image { data, mime_type } => {
                println!("{}", dim.apply_to(format!("[Image: {} ({} bytes)]", mime_type, data.len())))
            }
            ContentItem::Resource { uri, text } => {
                println!("{}", dim.apply_to(format!("[Resource: {}]", uri)));
                if let Some(text) = text {
                    println!("{}", text);
                }
            }
            ContentItem::Unknown => println!("{}", dim.apply_to("[unsupported content]")),
        }
    }
    Ok(())
}
