//! Tool invocation.

use serde_json::{Map, Value};

use crate::client::NexusClient;
use crate::error::{NexusError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, JsonRpcError, ListToolsResult, ToolInfo, methods,
};

impl NexusClient {
    /// List the tools the runtime exposes.
    pub fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let result: ListToolsResult = self.request_typed(methods::TOOLS_LIST, None)?;
        tracing::debug!(count = result.tools.len(), "listed tools");
        Ok(result.tools)
    }

    /// Call a tool with a mapping of arguments.
    ///
    /// `arguments` must be a JSON object; `null` is sent as `{}`. A result
    /// the runtime flags with `isError` becomes `NexusError::Tool` carrying
    /// the result's text.
    pub fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let arguments = into_arguments(arguments)?;
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        tracing::debug!(tool = %name, "calling tool");
        let result: CallToolResult =
            self.request_typed(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))?;

        if result.is_error() {
            let message = result.joined_text();
            tracing::warn!(tool = %name, error = %message, "tool reported an error");
            return Err(NexusError::tool(
                JsonRpcError::TOOL_EXECUTION_ERROR,
                message,
                None,
            ));
        }

        Ok(result)
    }

    /// Call a tool and return the text of its first text item.
    ///
    /// A result with no text item yields an empty string; only a failure of
    /// the call itself is an error.
    pub fn call_text(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self.call_tool(name, arguments)?;
        Ok(result.primary_text().to_string())
    }
}

fn into_arguments(arguments: Value) -> Result<Map<String, Value>> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(NexusError::InvalidArguments(format!(
            "tool arguments must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
