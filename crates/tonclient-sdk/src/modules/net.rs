//! Network queries and subscriptions.

use super::ClientContext;
use crate::subscription::{Subscription, SubscriptionCallback};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tonclient_kernel::{ClientResult, SubscriptionEvent};

pub use crate::subscription::{ParamsOfSubscribeCollection, ResultOfSubscribeCollection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub path: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamsOfQueryCollection {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<OrderBy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultOfQueryCollection {
    pub result: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamsOfWaitForCollection {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub result: String,
    /// Milliseconds. The context's `wait_for_timeout` applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultOfWaitForCollection {
    pub result: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamsOfQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultOfQuery {
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamsOfFindLastShardBlock {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultOfFindLastShardBlock {
    pub block_id: String,
}

/// The document carried by a subscription delivery, i.e. its `result` field.
pub fn subscription_document(event: &SubscriptionEvent) -> Option<&Value> {
    event.ok().and_then(|value| value.get("result"))
}

#[derive(Debug, Clone)]
pub struct NetModule {
    context: ClientContext,
}

impl NetModule {
    pub(crate) fn new(context: ClientContext) -> Self {
        Self { context }
    }

    pub async fn query_collection(
        &self,
        params: &ParamsOfQueryCollection,
    ) -> ClientResult<ResultOfQueryCollection> {
        self.context.call("net.query_collection", params).await
    }

    pub async fn wait_for_collection(
        &self,
        params: &ParamsOfWaitForCollection,
    ) -> ClientResult<ResultOfWaitForCollection> {
        self.context.call("net.wait_for_collection", params).await
    }

    pub async fn query(&self, params: &ParamsOfQuery) -> ClientResult<ResultOfQuery> {
        self.context.call("net.query", params).await
    }

    pub async fn find_last_shard_block(
        &self,
        params: &ParamsOfFindLastShardBlock,
    ) -> ClientResult<ResultOfFindLastShardBlock> {
        self.context.call("net.find_last_shard_block", params).await
    }

    /// Subscribe to `params.collection`. `callback` runs on the
    /// subscription's dispatch thread for every delivery.
    pub async fn subscribe_collection<F>(
        &self,
        params: ParamsOfSubscribeCollection,
        callback: F,
    ) -> ClientResult<Subscription>
    where
        F: Fn(SubscriptionEvent) + Send + Sync + 'static,
    {
        let callback: SubscriptionCallback = Arc::new(callback);
        self.context
            .manager()
            .subscribe(self.context.handle(), params, callback)
            .await
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) -> ClientResult<()> {
        self.context.manager().unsubscribe(subscription).await
    }

    /// Suspend every subscription of this context.
    pub async fn suspend(&self) -> ClientResult<()> {
        self.context.manager().suspend(self.context.handle()).await
    }

    pub async fn resume(&self) -> ClientResult<()> {
        self.context.manager().resume(self.context.handle()).await
    }
}
