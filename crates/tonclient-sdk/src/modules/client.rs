use super::ClientContext;
use serde::Deserialize;
use serde_json::Value;
use tonclient_kernel::{ClientConfig, ClientResult};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResultOfVersion {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultOfGetApiReference {
    pub api: Value,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResultOfBuildInfo {
    pub build_number: u32,
    pub dependencies: Vec<Value>,
}

/// Engine-level operations: setup, version and introspection.
#[derive(Debug, Clone)]
pub struct ClientModule {
    context: ClientContext,
}

impl ClientModule {
    pub(crate) fn new(context: ClientContext) -> Self {
        Self { context }
    }

    /// Re-issue `setup` with a new config.
    pub async fn setup(&self, config: ClientConfig) -> ClientResult<()> {
        self.context
            .manager()
            .reconfigure_async(self.context.handle(), config)
            .await
    }

    pub async fn version(&self) -> ClientResult<ResultOfVersion> {
        self.context.call("version", &()).await
    }

    pub async fn get_api_reference(&self) -> ClientResult<ResultOfGetApiReference> {
        self.context.call("client.get_api_reference", &()).await
    }

    pub async fn build_info(&self) -> ClientResult<ResultOfBuildInfo> {
        self.context.call("client.build_info", &()).await
    }
}
