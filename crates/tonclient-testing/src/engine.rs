use crate::filter;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tonclient_kernel::{
    ClientError, ClientResult, EncodedRequest, Engine, EngineEvent, EventSink, RawContext,
    RawResponse,
};
use tracing::debug;

/// Version reported by the mock's `version` method.
pub const MOCK_ENGINE_VERSION: &str = "0.25.0";

/// Per-method response override. `Err` becomes an engine error payload.
pub type Handler = Arc<dyn Fn(&Value) -> Result<Value, Value> + Send + Sync>;

/// One request as the engine saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub context: RawContext,
    pub method: String,
    pub params: Value,
    pub asynchronous: bool,
}

struct MockSubscription {
    context: RawContext,
    collection: String,
    filter: Value,
    sink: EventSink,
}

#[derive(Default)]
struct MockState {
    next_context: u32,
    live_contexts: HashSet<RawContext>,
    created: usize,
    destroyed: usize,
    calls: Vec<RecordedCall>,
    handlers: HashMap<String, Handler>,
    setups: HashMap<RawContext, Value>,
    suspended: HashSet<RawContext>,
    next_subscription: u32,
    subscriptions: HashMap<u32, MockSubscription>,
}

fn engine_error(code: i64, message: impl Into<String>) -> Value {
    json!({ "code": code, "message": message.into(), "data": {} })
}

/// In-process engine for tests.
///
/// Tracks contexts for leak checks, records every call, answers the
/// lifecycle methods (`setup`, `version`, `net.subscribe_collection`,
/// `net.unsubscribe`, `net.suspend`, `net.resume`) and lets tests push
/// documents to matching subscriptions with [`MockEngine::emit`].
///
/// Async results are delivered from a separate thread, as a native engine
/// would.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    honor_suspend: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_context: 1,
                next_subscription: 1,
                ..Default::default()
            })),
            honor_suspend: true,
        }
    }

    /// Keep emitting to suspended contexts, so only the binding's own
    /// delivery gate stands between the engine and the callbacks.
    pub fn ignoring_suspend() -> Self {
        Self {
            honor_suspend: false,
            ..Self::new()
        }
    }

    /// Override a method's response.
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .handlers
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Answer `method` with a fixed result.
    pub fn respond(&self, method: &str, result: Value) {
        self.on(method, move |_| Ok(result.clone()));
    }

    /// Answer `method` with a fixed engine error.
    pub fn fail(&self, method: &str, error: Value) {
        self.on(method, move |_| Err(error.clone()));
    }

    /// Drop an override so `method` gets its default answer again.
    pub fn clear_handler(&self, method: &str) {
        self.state.lock().handlers.remove(method);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Params of the most recent call to `method`.
    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.calls_for(method).pop().map(|call| call.params)
    }

    pub fn live_contexts(&self) -> usize {
        self.state.lock().live_contexts.len()
    }

    pub fn created_contexts(&self) -> usize {
        self.state.lock().created
    }

    pub fn destroyed_contexts(&self) -> usize {
        self.state.lock().destroyed
    }

    /// Setup params the context was configured with.
    pub fn setup_of(&self, context: RawContext) -> Option<Value> {
        self.state.lock().setups.get(&context).cloned()
    }

    pub fn is_suspended(&self, context: RawContext) -> bool {
        self.state.lock().suspended.contains(&context)
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Deliver `document` to every subscription on `collection` whose filter
    /// matches. Returns how many subscriptions it was sent to.
    pub fn emit(&self, collection: &str, document: Value) -> usize {
        let payload = json!({ "result": document }).to_string();
        self.deliver(collection, Some(&document), EngineEvent::result(payload))
    }

    /// Deliver an error event to every subscription on `collection`.
    pub fn emit_error(&self, collection: &str, error: Value) -> usize {
        self.deliver(collection, None, EngineEvent::error(error.to_string()))
    }

    fn deliver(&self, collection: &str, document: Option<&Value>, event: EngineEvent) -> usize {
        let sinks: Vec<EventSink> = {
            let state = self.state.lock();
            state
                .subscriptions
                .values()
                .filter(|sub| sub.collection == collection)
                .filter(|sub| !(self.honor_suspend && state.suspended.contains(&sub.context)))
                .filter(|sub| document.is_none_or(|doc| filter::matches(&sub.filter, doc)))
                .map(|sub| sub.sink.clone())
                .collect()
        };
        for sink in &sinks {
            sink(event.clone());
        }
        sinks.len()
    }

    fn record(&self, context: RawContext, request: &EncodedRequest, asynchronous: bool) -> ClientResult<Value> {
        let params = request.params_value()?;
        debug!("Mock engine call {} on {}", request.method(), context);
        self.state.lock().calls.push(RecordedCall {
            context,
            method: request.method().to_string(),
            params: params.clone(),
            asynchronous,
        });
        Ok(params)
    }

    fn answer(&self, context: RawContext, method: &str, params: &Value) -> Result<Value, Value> {
        let handler = {
            let state = self.state.lock();
            if !state.live_contexts.contains(&context) {
                return Err(engine_error(1, format!("Invalid context {context}")));
            }
            state.handlers.get(method).cloned()
        };
        if let Some(handler) = handler {
            return handler(params);
        }

        let mut state = self.state.lock();
        match method {
            "setup" => {
                state.setups.insert(context, params.clone());
                Ok(Value::Null)
            }
            "version" => Ok(json!({ "version": MOCK_ENGINE_VERSION })),
            "client.get_api_reference" => Ok(json!({
                "api": { "version": MOCK_ENGINE_VERSION, "modules": [
                    { "name": "client" }, { "name": "crypto" }, { "name": "net" },
                    { "name": "abi" }, { "name": "processing" }
                ]}
            })),
            "client.build_info" => Ok(json!({ "build_number": 0, "dependencies": [] })),
            "net.suspend" => {
                state.suspended.insert(context);
                Ok(Value::Null)
            }
            "net.resume" => {
                state.suspended.remove(&context);
                Ok(Value::Null)
            }
            "net.unsubscribe" => {
                let handle = params.get("handle").and_then(Value::as_u64).unwrap_or(0) as u32;
                match state.subscriptions.remove(&handle) {
                    Some(sub) => {
                        drop(state);
                        (sub.sink)(EngineEvent::finished());
                        Ok(Value::Null)
                    }
                    None => Err(engine_error(2, format!("Unknown subscription handle {handle}"))),
                }
            }
            "net.subscribe_collection" => Err(engine_error(
                3,
                "net.subscribe_collection requires the async entry point",
            )),
            other => Err(engine_error(4, format!("Unknown method {other}"))),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    fn create_context(&self) -> ClientResult<RawContext> {
        let mut state = self.state.lock();
        let context = state.next_context;
        state.next_context += 1;
        state.created += 1;
        state.live_contexts.insert(context);
        Ok(context)
    }

    fn destroy_context(&self, context: RawContext) {
        let mut state = self.state.lock();
        if state.live_contexts.remove(&context) {
            state.destroyed += 1;
            state.suspended.remove(&context);
            state.setups.remove(&context);
            state.subscriptions.retain(|_, sub| sub.context != context);
        }
    }

    fn request(&self, context: RawContext, request: &EncodedRequest) -> ClientResult<RawResponse> {
        let params = self.record(context, request, false)?;
        Ok(match self.answer(context, request.method(), &params) {
            Ok(result) => RawResponse::success(result.to_string()),
            Err(error) => RawResponse::failure(error.to_string()),
        })
    }

    fn request_async(
        &self,
        context: RawContext,
        request: &EncodedRequest,
        sink: EventSink,
    ) -> ClientResult<()> {
        let params = self.record(context, request, true)?;
        let engine = self.clone();
        let method = request.method().to_string();

        std::thread::Builder::new()
            .name("mock-engine".to_string())
            .spawn(move || {
                if method == "net.subscribe_collection" {
                    engine.register_subscription(context, &params, sink);
                    return;
                }
                let event = match engine.answer(context, &method, &params) {
                    Ok(result) => EngineEvent::result(result.to_string()),
                    Err(error) => EngineEvent::error(error.to_string()),
                };
                sink(event.and_finish());
            })
            .map_err(|e| ClientError::InvalidInput(format!("mock engine thread: {e}")))?;
        Ok(())
    }
}

impl MockEngine {
    fn register_subscription(&self, context: RawContext, params: &Value, sink: EventSink) {
        let registered = {
            let mut state = self.state.lock();
            if !state.live_contexts.contains(&context) {
                Err(engine_error(1, format!("Invalid context {context}")))
            } else if let Some(handler) = state.handlers.get("net.subscribe_collection").cloned() {
                // Overridden registration answers are passed through as-is.
                drop(state);
                handler(params)
            } else {
                let handle = state.next_subscription;
                state.next_subscription += 1;
                state.subscriptions.insert(
                    handle,
                    MockSubscription {
                        context,
                        collection: params["collection"].as_str().unwrap_or_default().to_string(),
                        filter: params.get("filter").cloned().unwrap_or(Value::Null),
                        sink: sink.clone(),
                    },
                );
                Ok(json!({ "handle": handle }))
            }
        };
        match registered {
            Ok(result) => sink(EngineEvent::result(result.to_string())),
            Err(error) => sink(EngineEvent::error(error.to_string()).and_finish()),
        }
    }
}
