//! Context manager
//!
//! Owns the mapping from [`ContextHandle`] to engine contexts. Every request
//! resolves its handle here first, so a destroyed or foreign handle fails with
//! [`ClientError::ContextInvalid`] before anything reaches the engine.

use crate::subscription::{DeliveryGate, SubscriptionShared};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tonclient_kernel::{
    ClientConfig, ClientError, ClientResult, ContextHandle, Engine, EngineEvent, EventSink,
    HandleTable, RawContext, RequestEnvelope, ResponseEnvelope,
};
use tracing::{debug, info, warn};

/// Bookkeeping for one live context.
pub(crate) struct ContextEntry {
    raw: RawContext,
    config: RwLock<ClientConfig>,
    pub(crate) gate: Arc<DeliveryGate>,
    pub(crate) subscriptions: Mutex<HashMap<u64, Arc<SubscriptionShared>>>,
}

impl ContextEntry {
    pub(crate) fn raw(&self) -> RawContext {
        self.raw
    }

    fn close_subscriptions(&self) {
        let subscriptions: Vec<_> = self.subscriptions.lock().drain().map(|(_, s)| s).collect();
        for subscription in subscriptions {
            subscription.close();
        }
    }
}

/// Creates, tracks and destroys engine contexts.
///
/// The manager is `Send + Sync`. Requests copy the raw context id out of the
/// table and release the lock before calling the engine, so a slow request
/// never blocks other contexts.
pub struct ContextManager {
    engine: Arc<dyn Engine>,
    contexts: RwLock<HandleTable<Arc<ContextEntry>>>,
}

impl ContextManager {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            contexts: RwLock::new(HandleTable::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Create an engine context and apply `config` through `setup`.
    ///
    /// When `setup` fails the engine context is destroyed again and the
    /// engine's error is returned unchanged.
    pub fn create(&self, config: ClientConfig) -> ClientResult<ContextHandle> {
        let raw = self.engine.create_context()?;
        if let Err(e) = self.setup(raw, &config) {
            warn!("Setup failed for engine context {}: {}", raw, e);
            self.engine.destroy_context(raw);
            return Err(e);
        }

        let entry = Arc::new(ContextEntry {
            raw,
            config: RwLock::new(config),
            gate: Arc::new(DeliveryGate::default()),
            subscriptions: Mutex::new(HashMap::new()),
        });
        let handle = self.contexts.write().insert(entry);
        info!("Created context {} (engine context {})", handle, raw);
        Ok(handle)
    }

    /// Destroy a context. Its subscriptions are closed first, so no callback
    /// runs once this returns. A second call fails with `ContextInvalid`.
    pub fn destroy(&self, handle: ContextHandle) -> ClientResult<()> {
        let entry = self
            .contexts
            .write()
            .remove(&handle)
            .ok_or(ClientError::ContextInvalid(handle))?;
        entry.close_subscriptions();
        self.engine.destroy_context(entry.raw);
        info!("Destroyed context {} (engine context {})", handle, entry.raw);
        Ok(())
    }

    /// Re-issue `setup` on a live context. The stored config is replaced only
    /// when the engine accepts it.
    pub fn reconfigure(&self, handle: ContextHandle, config: ClientConfig) -> ClientResult<()> {
        let entry = self.entry(handle)?;
        self.setup(entry.raw, &config)?;
        *entry.config.write() = config;
        Ok(())
    }

    /// [`ContextManager::reconfigure`] over the engine's async entry point.
    pub async fn reconfigure_async(&self, handle: ContextHandle, config: ClientConfig) -> ClientResult<()> {
        self.request_async(handle, "setup", config.to_setup_params()).await?;
        *self.entry(handle)?.config.write() = config;
        Ok(())
    }

    /// The config a context was last set up with.
    pub fn config(&self, handle: ContextHandle) -> ClientResult<ClientConfig> {
        Ok(self.entry(handle)?.config.read().clone())
    }

    pub fn is_alive(&self, handle: ContextHandle) -> bool {
        self.contexts.read().contains(&handle)
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }

    /// Blocking request on `handle`.
    pub fn request<P: Serialize + ?Sized>(
        &self,
        handle: ContextHandle,
        method: &str,
        params: &P,
    ) -> ClientResult<Value> {
        let raw = self.entry(handle)?.raw;
        let envelope = RequestEnvelope::from_params(raw, method, params)?;
        self.send(&envelope)
    }

    /// Request over the engine's async entry point. Resolves on the first
    /// event the engine delivers for it.
    pub async fn request_async(
        &self,
        handle: ContextHandle,
        method: &str,
        params: Value,
    ) -> ClientResult<Value> {
        let receiver = self.start_async(handle, method, params)?;
        let event = receiver.await.map_err(|_| {
            ClientError::malformed(format!("{method}: engine finished without a response"), "")
        })?;
        decode_async(&event)
    }

    fn start_async(
        &self,
        handle: ContextHandle,
        method: &str,
        params: Value,
    ) -> ClientResult<oneshot::Receiver<EngineEvent>> {
        let raw = self.entry(handle)?.raw;
        let envelope = RequestEnvelope::new(raw, method, params);
        debug!("Async request {} params: {}", envelope.method(), envelope.params());

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let sink: EventSink = Arc::new(move |event: EngineEvent| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(event);
            }
        });
        self.engine.request_async(raw, &envelope.encode(), sink)?;
        Ok(rx)
    }

    pub(crate) fn entry(&self, handle: ContextHandle) -> ClientResult<Arc<ContextEntry>> {
        self.contexts
            .read()
            .get(&handle)
            .cloned()
            .ok_or(ClientError::ContextInvalid(handle))
    }

    fn setup(&self, raw: RawContext, config: &ClientConfig) -> ClientResult<()> {
        let envelope = RequestEnvelope::new(raw, "setup", config.to_setup_params());
        self.send(&envelope).map(|_| ())
    }

    fn send(&self, envelope: &RequestEnvelope) -> ClientResult<Value> {
        debug!("Request {} params: {}", envelope.method(), envelope.params());
        let raw = self.engine.request(envelope.context(), &envelope.encode())?;
        debug!("Response {}: success={}", envelope.method(), raw.is_success);
        ResponseEnvelope::from_raw(&raw)?.into_result()
    }
}

/// Decode the single event an async request resolves with. A bare finished
/// marker answers a void method.
pub(crate) fn decode_async(event: &EngineEvent) -> ClientResult<Value> {
    if let Some(error) = event.error_json.as_deref().filter(|s| !s.is_empty()) {
        return ResponseEnvelope::decode(false, error)?.into_result();
    }
    let body = event.result_json.as_deref().unwrap_or_default();
    ResponseEnvelope::decode(true, body)?.into_result()
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        for (handle, entry) in self.contexts.get_mut().drain() {
            warn!("Context {} still alive when its manager dropped; destroying", handle);
            entry.close_subscriptions();
            self.engine.destroy_context(entry.raw);
        }
    }
}
