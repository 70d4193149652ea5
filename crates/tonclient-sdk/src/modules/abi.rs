use super::ClientContext;
use super::crypto::KeyPair;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tonclient_kernel::{ClientError, ClientResult};

/// Contract ABI, in one of the forms the engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Abi {
    Contract(Value),
    Json(String),
    Handle(u32),
    Serialized(Value),
}

impl Abi {
    /// Read an `.abi.json` file as the `Json` form.
    pub fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::InvalidInput(format!("abi {}: {e}", path.display())))?;
        Ok(Self::Json(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signer {
    None,
    External { public_key: String },
    Keys { keys: KeyPair },
    SigningBox { handle: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySet {
    /// Base64 encoded TVC image.
    pub tvc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workchain_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Value>,
}

impl DeploySet {
    pub fn from_tvc_bytes(tvc: impl AsRef<[u8]>) -> Self {
        Self {
            tvc: STANDARD.encode(tvc),
            workchain_id: None,
            initial_data: None,
        }
    }

    /// Read a `.tvc` file and encode it.
    pub fn from_tvc_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ClientError::InvalidInput(format!("tvc {}: {e}", path.display())))?;
        Ok(Self::from_tvc_bytes(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSet {
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl CallSet {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            header: None,
            input: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfEncodeMessage {
    pub abi: Abi,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_set: Option<DeploySet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_set: Option<CallSet>,
    pub signer: Signer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_try_index: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultOfEncodeMessage {
    pub message: String,
    #[serde(default)]
    pub data_to_sign: Option<String>,
    pub address: String,
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct AbiModule {
    context: ClientContext,
}

impl AbiModule {
    pub(crate) fn new(context: ClientContext) -> Self {
        Self { context }
    }

    pub async fn encode_message(&self, params: &ParamsOfEncodeMessage) -> ClientResult<ResultOfEncodeMessage> {
        self.context.call("abi.encode_message", params).await
    }
}
