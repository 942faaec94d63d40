//! JSON-RPC 2.0 envelope and Nexus method payloads.
//!
//! Requests carry a numeric id, a method name and an optional parameter
//! mapping. Responses must carry exactly one of `result` or `error`; anything
//! else is rejected when the envelope is decoded.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NexusError, Result};

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names understood by the runtime.
pub mod methods {
    /// Handshake.
    pub const INITIALIZE: &str = "initialize";
    /// Liveness.
    pub const PING: &str = "ping";
    /// Tool listing.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation.
    pub const TOOLS_CALL: &str = "tools/call";
    /// Resource listing.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource read.
    pub const RESOURCES_READ: &str = "resources/read";
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlating responses.
    pub id: u64,
    /// Method name to call.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Encode the request for a transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a request handed to a transport.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| NexusError::protocol(format!("malformed request envelope: {}", e)))
    }
}

/// The payload of a response: a result or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// The call succeeded.
    Result(Value),
    /// The runtime reported an error.
    Error(JsonRpcError),
}

/// A decoded JSON-RPC response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Request ID this response is for.
    pub id: u64,
    /// Result or error.
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    /// Create a successful response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    /// Create an error response.
    pub fn failure(id: u64, error: JsonRpcError) -> Self {
        Self {
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    /// Decode a response from raw transport bytes.
    ///
    /// Bytes that are not JSON are a transport failure. A JSON object that
    /// lacks an integer `id`, or carries both or neither of `result` and
    /// `error`, is a protocol violation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| NexusError::transport(format!("unreadable response: {}", e)))?;

        let Value::Object(mut object) = value else {
            return Err(NexusError::protocol("response is not a JSON object"));
        };

        let id = object
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| NexusError::protocol("response is missing a numeric id"))?;

        match (object.remove("result"), object.remove("error")) {
            (Some(result), None) => Ok(Self::success(id, result)),
            (None, Some(error)) => {
                let error: JsonRpcError = serde_json::from_value(error).map_err(|e| {
                    NexusError::protocol(format!("malformed error descriptor: {}", e))
                })?;
                Ok(Self::failure(id, error))
            }
            (Some(_), Some(_)) => Err(NexusError::protocol(
                "response carries both result and error",
            )),
            (None, None) => Err(NexusError::protocol(
                "response carries neither result nor error",
            )),
        }
    }

    /// Encode the response as a JSON-RPC object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
        object.insert("id".to_string(), Value::from(self.id));
        match &self.payload {
            ResponsePayload::Result(result) => {
                object.insert("result".to_string(), result.clone());
            }
            ResponsePayload::Error(error) => {
                object.insert(
                    "error".to_string(),
                    serde_json::to_value(error).unwrap_or(Value::Null),
                );
            }
        }
        Value::Object(object)
    }

    /// Encode the response for a transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_value())?)
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }

    /// Get the result, or the error descriptor if this is an error response.
    pub fn into_result(self) -> std::result::Result<Value, JsonRpcError> {
        match self.payload {
            ResponsePayload::Result(value) => Ok(value),
            ResponsePayload::Error(error) => Err(error),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// A tool ran and reported failure through its `isError` flag.
    pub const TOOL_EXECUTION_ERROR: i64 = -32000;

    /// Create a new error object.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<JsonRpcError> for NexusError {
    fn from(error: JsonRpcError) -> Self {
        NexusError::tool(error.code, error.message, error.data)
    }
}

/// Decode a method result into its typed shape.
pub(crate) fn decode_result<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| NexusError::decode(format!("unexpected {} result: {}", method, e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────────────────────────

/// Client info sent during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl ClientInfo {
    /// Client info for the given name at this crate's version.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version.
    pub protocol_version: String,
    /// Client info.
    pub client_info: ClientInfo,
    /// Client capabilities.
    pub capabilities: Map<String, Value>,
}

impl InitializeParams {
    /// Handshake parameters for the named client.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo::named(client_name),
            capabilities: Map::new(),
        }
    }
}

/// Server identity returned during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Result of the initialize request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version chosen by the server.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Server identity.
    pub server_info: ServerInfo,
    /// Negotiated capability set, keyed by capability name.
    #[serde(default)]
    pub capabilities: Map<String, Value>,
}

impl InitializeResult {
    /// Names of the capabilities the server advertised.
    pub fn capability_names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// A tool definition from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Result of the tools/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// List of available tools.
    pub tools: Vec<ToolInfo>,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Map<String, Value>,
}

/// Content item in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Image content (base64 encoded).
    Image {
        /// Base64-encoded image data.
        #[serde(default)]
        data: String,
        /// MIME type of the image.
        #[serde(default, rename = "mimeType", alias = "mime_type")]
        mime_type: String,
    },
    /// Resource reference.
    Resource {
        /// Resource URI.
        uri: String,
        /// Optional resource text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// A kind this client does not interpret.
    #[serde(other)]
    Unknown,
}

impl ContentItem {
    /// Create a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of a text-kind item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Decode content items one at a time; an item that does not fit its
/// declared kind becomes `Unknown` instead of failing the whole result.
fn lenient_content<'de, D>(deserializer: D) -> std::result::Result<Vec<ContentItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let items: Option<Vec<Value>> = Deserialize::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "skipping uninterpretable content item");
                ContentItem::Unknown
            })
        })
        .collect())
}

/// Result of the tools/call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool, in order.
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Vec<ContentItem>,
    /// Whether the tool call resulted in an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// A successful result holding a single text item.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: None,
        }
    }

    /// The first text-kind item, or an empty string if there is none.
    pub fn primary_text(&self) -> &str {
        self.content
            .iter()
            .find_map(ContentItem::as_text)
            .unwrap_or_default()
    }

    /// All text items joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the tool call was an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources
// ─────────────────────────────────────────────────────────────────────────────

/// A readable entity exposed by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Opaque identifier, e.g. `nexus://kv`.
    pub uri: String,
    /// Human name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Result of the resources/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Available resources.
    pub resources: Vec<ResourceDescriptor>,
}

/// Parameters for the resources/read request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// URI of the resource to read.
    pub uri: String,
}

/// One item of a resource's contents, either textual or binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// URI the item belongs to.
    #[serde(default)]
    pub uri: String,
    /// Optional MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Textual payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 binary payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Result of the resources/read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// Content items, in order.
    #[serde(default)]
    pub contents: Vec<ResourceContent>,
}

impl ResourceContents {
    /// Text of the first item, if it is textual.
    pub fn first_text(&self) -> Option<&str> {
        self.contents.first().and_then(|c| c.text.as_deref())
    }

    /// Decode the first item's text as JSON.
    pub fn first_json<T: DeserializeOwned>(&self) -> Result<T> {
        let text = self
            .first_text()
            .ok_or_else(|| NexusError::decode("resource has no textual content"))?;
        serde_json::from_str(text)
            .map_err(|e| NexusError::decode(format!("resource text is not valid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(1, "initialize", Some(json!({"test": true})));
        let json = String::from_utf8(req.to_bytes().unwrap()).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
    }

    #[test]
    fn test_request_without_params_omits_field() {
        let req = JsonRpcRequest::new(7, methods::PING, None);
        let json = String::from_utf8(req.to_bytes().unwrap()).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_response_deserialization() {
        let json = br#"{"jsonrpc":"2.0","id":1,"result":{"value":42}}"#;
        let resp = JsonRpcResponse::from_slice(json).unwrap();
        assert_eq!(resp.id, 1);
        assert!(!resp.is_error());
        assert_eq!(resp.into_result().unwrap(), json!({"value": 42}));
    }

    #[test]
    fn test_null_result_is_a_result() {
        let resp = JsonRpcResponse::from_slice(br#"{"jsonrpc":"2.0","id":3,"result":null}"#)
            .unwrap();
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_response() {
        let json =
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid Request"}}"#;
        let resp = JsonRpcResponse::from_slice(json).unwrap();
        assert!(resp.is_error());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
        assert_eq!(err.message, "Invalid Request");
    }

    #[test]
    fn test_response_with_both_fails_closed() {
        let json = br#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":1,"message":"x"}}"#;
        let err = JsonRpcResponse::from_slice(json).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_response_with_neither_fails_closed() {
        let err = JsonRpcResponse::from_slice(br#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn test_response_missing_id() {
        let err = JsonRpcResponse::from_slice(br#"{"jsonrpc":"2.0","result":{}}"#).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_unreadable_response_is_transport_error() {
        let err = JsonRpcResponse::from_slice(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_response_encoding() {
        let resp = JsonRpcResponse::failure(4, JsonRpcError::new(-32601, "Method not found"));
        let decoded = JsonRpcResponse::from_slice(&resp.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_initialize_params() {
        let params = InitializeParams::new("demo-client");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["clientInfo"]["name"], "demo-client");
        assert!(json["capabilities"].is_object());
    }

    #[test]
    fn test_initialize_result_requires_server_info() {
        let missing = json!({"protocolVersion": "2024-11-05", "capabilities": {}});
        assert!(serde_json::from_value::<InitializeResult>(missing).is_err());

        let ok = json!({
            "serverInfo": {"name": "nexus", "version": "0.1.0"},
            "capabilities": {"tools": {}, "resources": {}}
        });
        let result: InitializeResult = serde_json::from_value(ok).unwrap();
        assert_eq!(result.server_info.name, "nexus");
        assert_eq!(result.capability_names(), vec!["resources", "tools"]);
        assert!(result.protocol_version.is_none());
    }

    #[test]
    fn test_tool_info_deserialization() {
        let json = r#"{
            "name": "fs.read",
            "description": "Read a file from disk",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string"}
                },
                "required": ["path"]
            }
        }"#;
        let tool: ToolInfo = serde_json::from_str(json).unwrap();
        assert_eq!(tool.name, "fs.read");
        assert!(tool.description.is_some());
        assert!(tool.input_schema.is_some());
    }

    #[test]
    fn test_content_item_kinds() {
        let text: ContentItem = serde_json::from_str(r#"{"type":"text","text":"hi"}"#).unwrap();
        assert_eq!(text.as_text(), Some("hi"));

        let audio: ContentItem =
            serde_json::from_str(r#"{"type":"audio","data":"AAAA"}"#).unwrap();
        assert_eq!(audio, ContentItem::Unknown);
        assert_eq!(audio.as_text(), None);
    }

    #[test]
    fn test_primary_text_takes_first_text_item() {
        let json = r#"{
            "content": [
                {"type": "image", "data": "AAAA", "mimeType": "image/png"},
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "isError": false
        }"#;
        let result: CallToolResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_error());
        assert_eq!(result.primary_text(), "first");
        assert_eq!(result.joined_text(), "first\nsecond");
    }

    #[test]
    fn test_primary_text_absent_is_empty() {
        let result: CallToolResult = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(result.primary_text(), "");

        let result: CallToolResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result.primary_text(), "");

        let result: CallToolResult = serde_json::from_str(r#"{"content": null}"#).unwrap();
        assert!(result.content.is_empty());
    }

    #[test]
    fn test_snake_case_image_from_one_shot_output() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "image", "data": "AAAA", "mime_type": "image/png"},
                {"type": "text", "text": "caption"}
            ],
            "isError": false
        }))
        .unwrap();

        assert_eq!(
            result.content[0],
            ContentItem::Image {
                data: "AAAA".to_string(),
                mime_type: "image/png".to_string(),
            }
        );
        assert_eq!(result.primary_text(), "caption");
    }

    #[test]
    fn test_malformed_items_become_unknown() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text"},
                {"type": "resource", "resource": {"uri": "nexus://kv", "text": "[]"}},
                {"type": "image"},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();

        assert_eq!(result.content[0], ContentItem::Unknown);
        assert_eq!(result.content[1], ContentItem::Unknown);
        assert!(matches!(result.content[2], ContentItem::Image { .. }));
        assert_eq!(result.primary_text(), "second");
        assert_eq!(result.joined_text(), "second");
    }

    #[test]
    fn test_resource_contents_first_json() {
        let contents: ResourceContents = serde_json::from_value(json!({
            "contents": [{
                "uri": "nexus://kv",
                "mimeType": "application/json",
                "text": "[\"user:color\", \"visit_count\"]"
            }]
        }))
        .unwrap();

        let keys: Vec<String> = contents.first_json().unwrap();
        assert_eq!(keys, vec!["user:color", "visit_count"]);
    }

    #[test]
    fn test_resource_contents_without_text() {
        let contents = ResourceContents {
            contents: vec![ResourceContent {
                uri: "nexus://blob".to_string(),
                mime_type: None,
                text: None,
                blob: Some("AAAA".to_string()),
            }],
        };
        assert!(contents.first_text().is_none());
        assert!(contents.first_json::<Value>().unwrap_err().is_decode());
    }
}
