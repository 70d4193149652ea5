use super::ClientContext;
use super::abi::{Abi, ParamsOfEncodeMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonclient_kernel::ClientResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamsOfProcessMessage {
    pub message_encode_params: ParamsOfEncodeMessage,
    pub send_events: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultOfProcessMessage {
    pub transaction: Value,
    pub out_messages: Vec<String>,
    pub decoded: Option<Value>,
    pub fees: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamsOfSendMessage {
    /// Base64 encoded BOC.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<Abi>,
    pub send_events: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultOfSendMessage {
    pub shard_block_id: String,
}

#[derive(Debug, Clone)]
pub struct ProcessingModule {
    context: ClientContext,
}

impl ProcessingModule {
    pub(crate) fn new(context: ClientContext) -> Self {
        Self { context }
    }

    /// Encode, send and wait for the resulting transaction.
    pub async fn process_message(&self, params: &ParamsOfProcessMessage) -> ClientResult<ResultOfProcessMessage> {
        self.context.call("processing.process_message", params).await
    }

    pub async fn send_message(&self, params: &ParamsOfSendMessage) -> ClientResult<ResultOfSendMessage> {
        self.context.call("processing.send_message", params).await
    }
}
