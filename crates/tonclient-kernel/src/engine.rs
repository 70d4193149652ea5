//! Engine seam
//!
//! The [`Engine`] trait is the only way the bridge talks to the execution
//! engine. `tonclient-ffi` implements it over the native library, and
//! `tonclient-testing` implements it in-process for tests.

use crate::codec::EncodedRequest;
use crate::error::ClientResult;
use std::sync::Arc;

/// Engine-side context id, as returned by `tc_create_context`.
pub type RawContext = u32;

/// Response text read back from the engine, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub is_success: bool,
    pub json: String,
}

impl RawResponse {
    pub fn success(json: impl Into<String>) -> Self {
        Self {
            is_success: true,
            json: json.into(),
        }
    }

    pub fn failure(json: impl Into<String>) -> Self {
        Self {
            is_success: false,
            json: json.into(),
        }
    }
}

/// One callback invocation from the engine's async entry point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineEvent {
    pub result_json: Option<String>,
    pub error_json: Option<String>,
    /// No further events follow for this request id.
    pub finished: bool,
}

impl EngineEvent {
    pub fn result(json: impl Into<String>) -> Self {
        Self {
            result_json: Some(json.into()),
            ..Self::default()
        }
    }

    pub fn error(json: impl Into<String>) -> Self {
        Self {
            error_json: Some(json.into()),
            ..Self::default()
        }
    }

    pub fn finished() -> Self {
        Self {
            finished: true,
            ..Self::default()
        }
    }

    pub fn and_finish(mut self) -> Self {
        self.finished = true;
        self
    }
}

/// Receiver of async events. Invoked on engine threads.
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// The four operations an execution engine exposes.
pub trait Engine: Send + Sync {
    fn create_context(&self) -> ClientResult<RawContext>;

    /// Destroying an unknown context is a no-op at this layer.
    fn destroy_context(&self, context: RawContext);

    /// Blocking request. Exactly one response per request.
    fn request(&self, context: RawContext, request: &EncodedRequest) -> ClientResult<RawResponse>;

    /// Non-blocking request. `sink` receives zero or more events, the last
    /// one flagged `finished`. The sink may run before this returns.
    fn request_async(
        &self,
        context: RawContext,
        request: &EncodedRequest,
        sink: EventSink,
    ) -> ClientResult<()>;
}
