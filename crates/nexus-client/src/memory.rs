//! Persistent key-value memory on top of tool calls.
//!
//! [`Memory`] propagates every failure. [`BestEffortMemory`], obtained with
//! [`Memory::best_effort`], degrades failures instead: a recall that fails
//! is "absent", a listing that fails is empty and a store that fails
//! reports `false`. Callers pick the policy explicitly.
//!
//! Keys are opaque strings; `:` is the conventional namespace separator
//! (`user:color`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::client::NexusClient;
use crate::error::{NexusError, Result};

/// Names of the tools backing the memory facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTools {
    /// Tool taking `{key, value, ttl_secs?}`.
    pub store_tool: String,
    /// Tool taking `{key}` and answering `{found, value?}`.
    pub recall_tool: String,
    /// Tool taking `{prefix?}` and answering `{keys}`.
    pub list_tool: String,
}

impl Default for MemoryTools {
    fn default() -> Self {
        Self {
            store_tool: "memory.store".to_string(),
            recall_tool: "memory.recall".to_string(),
            list_tool: "memory.list".to_string(),
        }
    }
}

/// Payload of the recall tool's text result.
#[derive(Debug, Deserialize)]
struct RecallPayload {
    found: bool,
    #[serde(default)]
    value: Option<Value>,
}

/// Payload of the list tool's text result.
#[derive(Debug, Deserialize)]
struct ListPayload {
    keys: Vec<String>,
}

/// Strict memory facade: every failure is returned to the caller.
#[derive(Clone)]
pub struct Memory<'a> {
    client: &'a NexusClient,
    tools: MemoryTools,
}

impl<'a> Memory<'a> {
    /// Memory backed by the default tool names.
    pub fn new(client: &'a NexusClient) -> Self {
        Self::with_tools(client, MemoryTools::default())
    }

    /// Memory backed by custom tool names.
    pub fn with_tools(client: &'a NexusClient, tools: MemoryTools) -> Self {
        Self { client, tools }
    }

    /// Tool names in use.
    pub fn tools(&self) -> &MemoryTools {
        &self.tools
    }

    /// Switch to the suppressing policy.
    pub fn best_effort(self) -> BestEffortMemory<'a> {
        BestEffortMemory { inner: self }
    }

    /// Store a value under a key, replacing any previous value.
    ///
    /// Any non-error response counts as success; its payload is not inspected.
    pub fn store(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.store_entry(key, value.into(), None)
    }

    /// Store a value that the runtime expires after `ttl`.
    pub fn store_with_ttl(&self, key: &str, value: impl Into<Value>, ttl: Duration) -> Result<()> {
        self.store_entry(key, value.into(), Some(ttl))
    }

    fn store_entry(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let mut args = Map::new();
        args.insert("key".to_string(), Value::from(key));
        args.insert("value".to_string(), value);
        if let Some(ttl) = ttl {
            args.insert("ttl_secs".to_string(), Value::from(ttl.as_secs()));
        }
        self.client
            .call_tool(&self.tools.store_tool, Value::Object(args))?;
        tracing::debug!(key = %key, "stored memory");
        Ok(())
    }

    /// Look up a key. `Ok(None)` means the runtime reported it absent.
    ///
    /// A string value is returned as stored; any other JSON value is
    /// returned in its serialized form.
    pub fn recall(&self, key: &str) -> Result<Option<String>> {
        let text = self
            .client
            .call_text(&self.tools.recall_tool, json!({ "key": key }))?;
        let payload: RecallPayload = serde_json::from_str(&text)
            .map_err(|e| NexusError::decode(format!("unexpected recall payload: {}", e)))?;

        if !payload.found {
            return Ok(None);
        }
        match payload.value {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(value) => Ok(Some(value.to_string())),
            None => Err(NexusError::decode(format!(
                "recall of '{}' reported found without a value",
                key
            ))),
        }
    }

    /// List stored keys, optionally only those starting with `prefix`.
    ///
    /// Keys are returned in the order the runtime reports them.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let args = match prefix {
            Some(prefix) => json!({ "prefix": prefix }),
            None => json!({}),
        };
        let text = self.client.call_text(&self.tools.list_tool, args)?;
        let payload: ListPayload = serde_json::from_str(&text)
            .map_err(|e| NexusError::decode(format!("unexpected list payload: {}", e)))?;
        Ok(payload.keys)
    }
}

/// Memory facade that degrades failures to "absent" or "empty".
#[derive(Clone)]
pub struct BestEffortMemory<'a> {
    inner: Memory<'a>,
}

impl<'a> BestEffortMemory<'a> {
    /// Back to the strict policy.
    pub fn strict(self) -> Memory<'a> {
        self.inner
    }

    /// Store a value; `false` if the store failed.
    pub fn store(&self, key: &str, value: impl Into<Value>) -> bool {
        match self.inner.store(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "suppressed memory store failure");
                false
            }
        }
    }

    /// Store a value with a TTL; `false` if the store failed.
    pub fn store_with_ttl(&self, key: &str, value: impl Into<Value>, ttl: Duration) -> bool {
        match self.inner.store_with_ttl(key, value, ttl) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "suppressed memory store failure");
                false
            }
        }
    }

    /// Look up a key; `None` when absent or when the lookup failed.
    pub fn recall(&self, key: &str) -> Option<String> {
        self.inner.recall(key).unwrap_or_else(|e| {
            tracing::debug!(key = %key, error = %e, "suppressed memory recall failure");
            None
        })
    }

    /// List keys; empty when the listing failed.
    pub fn list(&self, prefix: Option<&str>) -> Vec<String> {
        self.inner.list(prefix).unwrap_or_else(|e| {
            tracing::debug!(prefix = ?prefix, error = %e, "suppressed memory list failure");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{Reply, ScriptedTransport};

    fn client(replies: Vec<Reply>) -> (NexusClient, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        (NexusClient::with_transport(transport.clone()), transport)
    }

    #[test]
    fn test_store_sends_key_and_value() {
        let (client, transport) = client(vec![Reply::text(
            r#"{"success":true,"key":"user:color","stored":true}"#,
        )]);
        client.memory().store("user:color", "blue").unwrap();

        let params = transport.requests()[0].params.clone().unwrap();
        assert_eq!(params["name"], "memory.store");
        assert_eq!(params["arguments"], json!({"key": "user:color", "value": "blue"}));
    }

    #[test]
    fn test_store_ignores_payload() {
        let (client, _) = client(vec![Reply::text("not json at all")]);
        assert!(client.memory().store("k", "v").is_ok());
    }

    #[test]
    fn test_store_with_ttl() {
        let (client, transport) = client(vec![Reply::text("{}")]);
        client
            .memory()
            .store_with_ttl("session:token", "abc", Duration::from_secs(60))
            .unwrap();

        let params = transport.requests()[0].params.clone().unwrap();
        assert_eq!(params["arguments"]["ttl_secs"], 60);
    }

    #[test]
    fn test_recall_found() {
        let (client, _) = client(vec![Reply::text(
            r#"{"found":true,"key":"visit_count","value":"1"}"#,
        )]);
        assert_eq!(
            client.memory().recall("visit_count").unwrap(),
            Some("1".to_string())
        );
    }

    #[test]
    fn test_recall_structured_value_is_serialized() {
        let (client, _) = client(vec![Reply::text(
            r#"{"found":true,"key":"prefs","value":{"theme":"dark"}}"#,
        )]);
        assert_eq!(
            client.memory().recall("prefs").unwrap(),
            Some(r#"{"theme":"dark"}"#.to_string())
        );
    }

    #[test]
    fn test_recall_absent() {
        let (client, _) = client(vec![Reply::text(r#"{"found":false,"key":"never_set"}"#)]);
        assert_eq!(client.memory().recall("never_set").unwrap(), None);
    }

    #[test]
    fn test_strict_recall_surfaces_failures() {
        let (client, _) = client(vec![
            Reply::text("garbage"),
            Reply::text(r#"{"found":true}"#),
            Reply::Fail(NexusError::ConnectionClosed),
            Reply::error(-32603, "backend offline"),
        ]);
        let memory = client.memory();

        assert!(memory.recall("a").unwrap_err().is_decode());
        assert!(memory.recall("b").unwrap_err().is_decode());
        assert!(memory.recall("c").unwrap_err().is_transport());
        assert!(memory.recall("d").unwrap_err().is_tool());
    }

    #[test]
    fn test_best_effort_recall_suppresses_failures() {
        let (client, _) = client(vec![
            Reply::text("garbage"),
            Reply::Fail(NexusError::ConnectionClosed),
            Reply::error(-32603, "backend offline"),
            Reply::text(r#"{"found":true,"value":"2"}"#),
        ]);
        let memory = client.memory().best_effort();

        assert_eq!(memory.recall("never_set"), None);
        assert_eq!(memory.recall("never_set"), None);
        assert_eq!(memory.recall("never_set"), None);
        assert_eq!(memory.recall("visit_count"), Some("2".to_string()));
    }

    #[test]
    fn test_list_with_and_without_prefix() {
        let (client, transport) = client(vec![
            Reply::text(r#"{"keys":["user:color","user:name"],"count":2}"#),
            Reply::text(r#"{"keys":["user:color","user:name","visit_count"],"count":3}"#),
        ]);
        let memory = client.memory();

        assert_eq!(
            memory.list(Some("user:")).unwrap(),
            vec!["user:color", "user:name"]
        );
        assert_eq!(memory.list(None).unwrap().len(), 3);

        let sent = transport.requests();
        assert_eq!(sent[0].params.as_ref().unwrap()["arguments"], json!({"prefix": "user:"}));
        assert_eq!(sent[1].params.as_ref().unwrap()["arguments"], json!({}));
    }

    #[test]
    fn test_list_parse_failure() {
        let (client, _) = client(vec![Reply::text("[]"), Reply::text(r#"{"count":0}"#)]);
        assert!(client.memory().list(None).unwrap_err().is_decode());
        assert!(client.memory().best_effort().list(None).is_empty());
    }

    #[test]
    fn test_best_effort_store_reports_failure() {
        let (client, _) = client(vec![Reply::text("{}"), Reply::error(-32000, "disk full")]);
        let memory = client.memory().best_effort();
        assert!(memory.store("k", "v"));
        assert!(!memory.store("k", "v"));
    }

    #[test]
    fn test_custom_tool_names() {
        let tools = MemoryTools {
            recall_tool: "kv.get".to_string(),
            ..Default::default()
        };
        let transport = ScriptedTransport::new(vec![Reply::text(r#"{"found":false}"#)]);
        let client = NexusClient::with_transport(transport.clone()).with_memory_tools(tools);

        assert_eq!(client.memory().recall("k").unwrap(), None);
        assert_eq!(
            transport.requests()[0].params.as_ref().unwrap()["name"],
            "kv.get"
        );
    }

    #[test]
    fn test_strict_roundtrip_through_best_effort() {
        let (client, _) = client(vec![]);
        let memory = client.memory().best_effort().strict();
        assert_eq!(memory.tools(), &MemoryTools::default());
    }
}
