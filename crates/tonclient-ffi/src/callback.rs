//! Async result trampoline
//!
//! `tc_json_request_async` reports results through a plain C function
//! pointer that carries only a request id. Pending sinks are kept in a
//! registry keyed by that id. [`on_result`] copies the engine's strings,
//! looks the sink up and forwards an [`EngineEvent`].

use crate::interop::{FLAG_FINISHED, InteropString};
use dashmap::DashMap;
use serde_json::json;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicI32, Ordering};
use tonclient_kernel::{EngineEvent, EventSink};
use tracing::{error, trace, warn};

/// Error code of the event forwarded in place of a non-UTF-8 engine string.
pub const INVALID_UTF8_CODE: i64 = -1;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);
static PENDING: LazyLock<DashMap<i32, EventSink>> = LazyLock::new(DashMap::new);

/// Register a sink and allocate its request id.
pub(crate) fn register(sink: EventSink) -> i32 {
    let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    PENDING.insert(id, sink);
    id
}

pub(crate) fn unregister(request_id: i32) {
    PENDING.remove(&request_id);
}

/// Whether a sink is still waiting for `request_id`.
pub fn is_pending(request_id: i32) -> bool {
    PENDING.contains_key(&request_id)
}

fn owned(text: &InteropString) -> Result<Option<String>, std::str::Utf8Error> {
    if text.is_empty() {
        return Ok(None);
    }
    // SAFETY: the engine keeps both strings alive for the duration of the
    // callback; they are copied before returning.
    unsafe { text.to_owned_string() }.map(Some)
}

/// Copy both strings out. Invalid UTF-8 in either one becomes an error
/// event instead of an altered payload.
fn event(request_id: i32, result_json: &InteropString, error_json: &InteropString, finished: bool) -> EngineEvent {
    match (owned(result_json), owned(error_json)) {
        (Ok(result_json), Ok(error_json)) => EngineEvent {
            result_json,
            error_json,
            finished,
        },
        (Err(e), _) | (_, Err(e)) => {
            error!("Async result for request {} is not valid UTF-8: {}", request_id, e);
            let payload = json!({
                "code": INVALID_UTF8_CODE,
                "message": format!("engine response is not valid UTF-8: {e}"),
            });
            EngineEvent {
                result_json: None,
                error_json: Some(payload.to_string()),
                finished,
            }
        }
    }
}

fn dispatch(request_id: i32, result_json: InteropString, error_json: InteropString, flags: i32) {
    let finished = flags & FLAG_FINISHED != 0;
    let sink = if finished {
        PENDING.remove(&request_id).map(|(_, sink)| sink)
    } else {
        PENDING.get(&request_id).map(|entry| entry.value().clone())
    };
    let Some(sink) = sink else {
        warn!("Result for unknown request id {}", request_id);
        return;
    };

    let event = event(request_id, &result_json, &error_json, finished);
    trace!("Async result for request {}: finished={}", request_id, finished);
    sink(event);
}

/// `OnResult` handed to the engine.
pub(crate) extern "C" fn on_result(
    request_id: i32,
    result_json: InteropString,
    error_json: InteropString,
    flags: i32,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        dispatch(request_id, result_json, error_json, flags)
    }));
    if outcome.is_err() {
        error!("Event sink for request {} panicked", request_id);
    }
}
