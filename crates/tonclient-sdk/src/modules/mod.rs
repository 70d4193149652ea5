//! Module facades
//!
//! Each module maps its operations onto one fixed engine method name and
//! delegates through [`ClientContext`]. Engine errors come back unchanged.

pub mod abi;
pub mod client;
pub mod crypto;
pub mod net;
pub mod processing;

use crate::manager::ContextManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tonclient_kernel::{ClientError, ClientResult, ContextHandle, decode_typed};
use tracing::warn;

struct ContextInner {
    manager: Arc<ContextManager>,
    handle: ContextHandle,
    destroyed: AtomicBool,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.manager.destroy(self.handle) {
            warn!("Failed to destroy context {} on drop: {}", self.handle, e);
        }
    }
}

/// A context shared by a client and its modules. The context is destroyed
/// when the last clone drops, or earlier through [`ClientContext::destroy`].
#[derive(Clone)]
pub struct ClientContext {
    inner: Arc<ContextInner>,
}

impl ClientContext {
    pub fn new(manager: Arc<ContextManager>, handle: ContextHandle) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                manager,
                handle,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn handle(&self) -> ContextHandle {
        self.inner.handle
    }

    pub fn manager(&self) -> &Arc<ContextManager> {
        &self.inner.manager
    }

    /// Destroy now. Later calls through any clone fail with `ContextInvalid`.
    pub fn destroy(&self) -> ClientResult<()> {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Err(ClientError::ContextInvalid(self.inner.handle));
        }
        self.inner.manager.destroy(self.inner.handle)
    }

    pub(crate) async fn call<P, R>(&self, method: &str, params: &P) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = to_params(params)?;
        let value = self.inner.manager.request_async(self.inner.handle, method, params).await?;
        decode_typed(value)
    }

    /// For methods whose result is ignored.
    pub(crate) async fn call_void<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> ClientResult<()> {
        let params = to_params(params)?;
        self.inner
            .manager
            .request_async(self.inner.handle, method, params)
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext").field("handle", &self.inner.handle).finish()
    }
}

fn to_params<P: Serialize + ?Sized>(params: &P) -> ClientResult<Value> {
    serde_json::to_value(params).map_err(|e| ClientError::InvalidInput(format!("params: {e}")))
}
