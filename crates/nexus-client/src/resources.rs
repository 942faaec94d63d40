//! Resource listing and reading.

use crate::client::NexusClient;
use crate::error::Result;
use crate::protocol::{
    ListResourcesResult, ReadResourceParams, ResourceContents, ResourceDescriptor, methods,
};

impl NexusClient {
    /// List the resources the runtime exposes.
    pub fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        let result: ListResourcesResult = self.request_typed(methods::RESOURCES_LIST, None)?;
        tracing::debug!(count = result.resources.len(), "listed resources");
        Ok(result.resources)
    }

    /// Read a resource by URI.
    ///
    /// An unknown URI is reported by the runtime as an ordinary error
    /// descriptor and surfaces as `NexusError::Tool`.
    pub fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        let params = ReadResourceParams {
            uri: uri.to_string(),
        };
        self.request_typed(methods::RESOURCES_READ, Some(serde_json::to_value(params)?))
    }
}
