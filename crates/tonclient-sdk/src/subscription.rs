//! Subscription event channel
//!
//! A subscription is an async `net.subscribe_collection` request that never
//! finishes on its own. The engine's first event registers it; every later
//! event is a delivery.
//!
//! ```text
//! engine thread --sink--> [gate] --crossbeam--> dispatch thread --> callback
//! ```
//!
//! The gate is per context. While a context is suspended events are dropped
//! at the sink, never queued for later.

use crate::manager::ContextManager;
use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use tokio::sync::oneshot;
use tonclient_kernel::{
    ClientError, ClientResult, ContextHandle, EngineEvent, EventSink, RequestEnvelope,
    SubscriptionEvent, SubscriptionFault, decode_event, decode_typed,
};
use tracing::{debug, info, trace, warn};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Receives every delivery of one subscription, on its dispatch thread.
pub type SubscriptionCallback = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParamsOfSubscribeCollection {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub result: String,
}

impl ParamsOfSubscribeCollection {
    pub fn new(collection: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            result: result.into(),
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ResultOfSubscribeCollection {
    pub handle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Suspended,
    Unsubscribed,
}

/// Context-wide suspend switch.
#[derive(Debug, Default)]
pub(crate) struct DeliveryGate {
    suspended: AtomicBool,
}

impl DeliveryGate {
    pub(crate) fn is_open(&self) -> bool {
        !self.suspended.load(Ordering::Acquire)
    }

    fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::Release);
    }
}

/// State shared by the public handle, the context entry and the dispatcher.
pub(crate) struct SubscriptionShared {
    id: u64,
    closed: AtomicBool,
    // Held for the whole callback invocation.
    delivering: Mutex<()>,
    // Dropping the sender stops the dispatcher.
    shutdown: Mutex<Option<Sender<()>>>,
    dispatcher: OnceLock<ThreadId>,
    callback: SubscriptionCallback,
}

impl SubscriptionShared {
    /// Mark closed and wait out an in-flight callback. Returns `false` when
    /// already closed.
    ///
    /// Called from the subscription's own callback it returns at once: that
    /// callback is the last one to run.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.lock().take();
        if !self.on_dispatcher() {
            drop(self.delivering.lock());
        }
        true
    }

    fn on_dispatcher(&self) -> bool {
        self.dispatcher.get() == Some(&std::thread::current().id())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn deliver(&self, event: SubscriptionEvent) {
        let _delivering = self.delivering.lock();
        if self.is_closed() {
            return;
        }
        (self.callback)(event);
    }
}

/// Handle to a registered subscription.
#[derive(Clone)]
pub struct Subscription {
    shared: Arc<SubscriptionShared>,
    context: ContextHandle,
    handle: u32,
    params: ParamsOfSubscribeCollection,
    gate: Arc<DeliveryGate>,
}

impl Subscription {
    /// Binding-side id, unique per process.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// The engine's subscription token.
    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn context(&self) -> ContextHandle {
        self.context
    }

    pub fn collection(&self) -> &str {
        &self.params.collection
    }

    pub fn filter(&self) -> Option<&Value> {
        self.params.filter.as_ref()
    }

    pub fn result(&self) -> &str {
        &self.params.result
    }

    pub fn state(&self) -> SubscriptionState {
        if self.shared.is_closed() {
            SubscriptionState::Unsubscribed
        } else if self.gate.is_open() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Suspended
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.shared.id)
            .field("handle", &self.handle)
            .field("context", &self.context)
            .field("collection", &self.params.collection)
            .field("state", &self.state())
            .finish()
    }
}

impl ContextManager {
    /// Register a subscription and start its dispatcher.
    ///
    /// A registration the engine rejects returns the engine's error; nothing
    /// is left running in that case.
    pub async fn subscribe(
        &self,
        handle: ContextHandle,
        params: ParamsOfSubscribeCollection,
        callback: SubscriptionCallback,
    ) -> ClientResult<Subscription> {
        let entry = self.entry(handle)?;
        let gate = entry.gate.clone();
        let envelope = RequestEnvelope::from_params(entry.raw(), "net.subscribe_collection", &params)?;
        debug!("Subscribing on {} params: {}", handle, envelope.params());

        let (registered_tx, registered_rx) = oneshot::channel::<EngineEvent>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<EngineEvent>();
        let registration = Mutex::new(Some(registered_tx));
        let sink_gate = gate.clone();
        let sink: EventSink = Arc::new(move |event: EngineEvent| {
            if let Some(tx) = registration.lock().take() {
                let _ = tx.send(event);
                return;
            }
            if !event.finished && !sink_gate.is_open() {
                trace!("Dropped subscription event while suspended");
                return;
            }
            let _ = event_tx.send(event);
        });
        self.engine()
            .request_async(entry.raw(), &envelope.encode(), sink)?;
        drop(entry);

        let first = registered_rx
            .await
            .map_err(|_| SubscriptionFault::StreamClosed)?;
        let registered = registration_result(&first)?;

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::new(SubscriptionShared {
            id: NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
            delivering: Mutex::new(()),
            shutdown: Mutex::new(Some(shutdown_tx)),
            dispatcher: OnceLock::new(),
            callback,
        });

        spawn_dispatcher(shared.clone(), event_rx, shutdown_rx)?;

        // The context may have been destroyed while registration was pending.
        match self.entry(handle) {
            Ok(entry) => {
                entry.subscriptions.lock().insert(shared.id, shared.clone());
            }
            Err(e) => {
                shared.close();
                return Err(e);
            }
        }

        info!(
            "Subscription {} active on {} (engine handle {}, collection {})",
            shared.id, handle, registered.handle, params.collection
        );
        Ok(Subscription {
            shared,
            context: handle,
            handle: registered.handle,
            params,
            gate,
        })
    }

    /// Stop a subscription. No callback runs once this returns.
    ///
    /// The engine is asked first; when it refuses, the subscription stays
    /// active and the call can be retried.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> ClientResult<()> {
        self.entry(subscription.context)?;
        if subscription.shared.is_closed() {
            return Err(SubscriptionFault::AlreadyUnsubscribed(subscription.id()).into());
        }

        self.request_async(
            subscription.context,
            "net.unsubscribe",
            json!({ "handle": subscription.handle }),
        )
        .await?;

        subscription.shared.close();
        if let Ok(entry) = self.entry(subscription.context) {
            entry.subscriptions.lock().remove(&subscription.id());
        }
        info!("Subscription {} unsubscribed", subscription.id());
        Ok(())
    }

    /// Pause delivery for every subscription of the context.
    pub async fn suspend(&self, handle: ContextHandle) -> ClientResult<()> {
        let gate = self.entry(handle)?.gate.clone();
        gate.set_suspended(true);
        if let Err(e) = self.request_async(handle, "net.suspend", json!({})).await {
            gate.set_suspended(false);
            return Err(e);
        }
        info!("Context {} suspended", handle);
        Ok(())
    }

    /// Resume delivery. Events dropped while suspended are not replayed.
    pub async fn resume(&self, handle: ContextHandle) -> ClientResult<()> {
        let gate = self.entry(handle)?.gate.clone();
        self.request_async(handle, "net.resume", json!({})).await?;
        gate.set_suspended(false);
        info!("Context {} resumed", handle);
        Ok(())
    }
}

fn registration_result(event: &EngineEvent) -> ClientResult<ResultOfSubscribeCollection> {
    if let Some(error) = event.error_json.as_deref().filter(|s| !s.is_empty()) {
        warn!("Subscription registration rejected: {}", error);
        return Err(match tonclient_kernel::EngineErrorPayload::parse(error) {
            Ok(payload) => ClientError::Engine(payload),
            Err(malformed) => malformed,
        });
    }
    match decode_event(event) {
        Some(SubscriptionEvent::Ok(value)) => decode_typed(value)
            .map_err(|e| ClientError::from(SubscriptionFault::RegistrationFailed(e.to_string()))),
        Some(SubscriptionEvent::Error(e)) => Err(e),
        None => Err(SubscriptionFault::StreamClosed.into()),
    }
}

fn spawn_dispatcher(
    shared: Arc<SubscriptionShared>,
    events: Receiver<EngineEvent>,
    shutdown: Receiver<()>,
) -> ClientResult<()> {
    let name = format!("tonclient-subscription-{}", shared.id);
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            let _ = shared.dispatcher.set(std::thread::current().id());
            dispatch_loop(&shared, &events, &shutdown)
        })
        .map(|_| ())
        .map_err(|e| {
            ClientError::from(SubscriptionFault::RegistrationFailed(format!("dispatch thread: {e}")))
        })
}

fn dispatch_loop(shared: &SubscriptionShared, events: &Receiver<EngineEvent>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                if let Some(decoded) = decode_event(&event) {
                    shared.deliver(decoded);
                }
                if event.finished {
                    break;
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
    debug!("Subscription {} dispatcher stopped", shared.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn shared(counter: Arc<AtomicUsize>) -> Arc<SubscriptionShared> {
        Arc::new(SubscriptionShared {
            id: 7,
            closed: AtomicBool::new(false),
            delivering: Mutex::new(()),
            shutdown: Mutex::new(None),
            dispatcher: OnceLock::new(),
            callback: Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }

    #[test]
    fn close_is_one_shot_and_stops_delivery() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = shared(counter.clone());

        sub.deliver(SubscriptionEvent::Ok(json!(1)));
        assert!(sub.close());
        assert!(!sub.close());
        sub.deliver(SubscriptionEvent::Ok(json!(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_from_own_callback_does_not_wait() {
        let slot: Arc<OnceLock<Arc<SubscriptionShared>>> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (me, flag) = (slot.clone(), closed.clone());
        let sub = Arc::new(SubscriptionShared {
            id: 8,
            closed: AtomicBool::new(false),
            delivering: Mutex::new(()),
            shutdown: Mutex::new(None),
            dispatcher: OnceLock::new(),
            callback: Arc::new(move |_| {
                if let Some(me) = me.get() {
                    flag.store(me.close(), Ordering::SeqCst);
                }
            }),
        });
        let _ = slot.set(sub.clone());
        let _ = sub.dispatcher.set(std::thread::current().id());

        sub.deliver(SubscriptionEvent::Ok(json!(1)));
        assert!(closed.load(Ordering::SeqCst));
        assert!(sub.is_closed());
    }

    #[test]
    fn dispatcher_stops_on_finished() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = shared(counter.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);

        tx.send(EngineEvent::result(r#"{"result":{"id":"a"}}"#)).unwrap();
        tx.send(EngineEvent::error(r#"{"code":1,"message":"x"}"#)).unwrap();
        tx.send(EngineEvent::finished()).unwrap();
        tx.send(EngineEvent::result(r#"{"result":{"id":"late"}}"#)).unwrap();
        dispatch_loop(&sub, &rx, &shutdown_rx);

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registration_decoding() {
        let ok = registration_result(&EngineEvent::result(r#"{"handle":9}"#)).unwrap();
        assert_eq!(ok.handle, 9);

        let rejected =
            registration_result(&EngineEvent::error(r#"{"code":3,"message":"no"}"#).and_finish());
        assert_eq!(rejected.unwrap_err().engine_payload().unwrap().code(), Some(3));

        assert!(matches!(
            registration_result(&EngineEvent::finished()),
            Err(ClientError::Subscription(SubscriptionFault::StreamClosed))
        ));
        assert!(matches!(
            registration_result(&EngineEvent::result(r#"{"nope":1}"#)),
            Err(ClientError::Subscription(SubscriptionFault::RegistrationFailed(_)))
        ));
    }

    #[test]
    fn gate_toggles() {
        let gate = DeliveryGate::default();
        assert!(gate.is_open());
        gate.set_suspended(true);
        assert!(!gate.is_open());
        gate.set_suspended(false);
        assert!(gate.is_open());
    }
}
