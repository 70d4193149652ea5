//! Native engine loader
//!
//! Loads the engine's shared library once and resolves its entry points into
//! an immutable symbol table. [`NativeEngine`] implements the kernel's
//! [`Engine`] seam over that table.

use crate::callback;
use crate::interop::{InteropJsonResponse, InteropString, JsonResponseHandle, OnResult};
use crate::platform::{Platform, default_library_path};
use libloading::{Library, Symbol};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tonclient_kernel::{
    ClientError, ClientResult, EncodedRequest, Engine, EventSink, RawContext, RawResponse,
};
use tracing::{debug, info};

type CreateContextFn = unsafe extern "C" fn() -> u32;
type DestroyContextFn = unsafe extern "C" fn(context: u32);
type JsonRequestFn = unsafe extern "C" fn(
    context: u32,
    method_name: InteropString,
    params_json: InteropString,
) -> *const JsonResponseHandle;
type JsonRequestAsyncFn = unsafe extern "C" fn(
    context: u32,
    method_name: InteropString,
    params_json: InteropString,
    request_id: i32,
    on_result: OnResult,
);
type ReadJsonResponseFn =
    unsafe extern "C" fn(response: *const JsonResponseHandle) -> InteropJsonResponse;
type DestroyJsonResponseFn = unsafe extern "C" fn(response: *const JsonResponseHandle);

/// Entry points resolved from the engine library.
#[derive(Clone, Copy)]
struct EngineSymbols {
    create_context: CreateContextFn,
    destroy_context: DestroyContextFn,
    json_request: JsonRequestFn,
    json_request_async: JsonRequestAsyncFn,
    read_json_response: ReadJsonResponseFn,
    destroy_json_response: DestroyJsonResponseFn,
}

unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, String> {
    let symbol: Symbol<T> = unsafe { library.get(name.as_bytes()) }
        .map_err(|e| format!("symbol {name} not found: {e}"))?;
    Ok(*symbol)
}

impl EngineSymbols {
    /// # Safety
    /// The library must export these symbols with the declared signatures.
    unsafe fn resolve(library: &Library) -> Result<Self, String> {
        unsafe {
            Ok(Self {
                create_context: symbol(library, "tc_create_context")?,
                destroy_context: symbol(library, "tc_destroy_context")?,
                json_request: symbol(library, "tc_json_request")?,
                json_request_async: symbol(library, "tc_json_request_async")?,
                read_json_response: symbol(library, "tc_read_json_response")?,
                destroy_json_response: symbol(library, "tc_destroy_json_response")?,
            })
        }
    }
}

/// Releases an engine-owned response on every exit path.
struct ResponseGuard<'a> {
    ptr: *const JsonResponseHandle,
    destroy: DestroyJsonResponseFn,
    _engine: PhantomData<&'a NativeEngine>,
}

impl Drop for ResponseGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `tc_json_request` and is destroyed once.
        unsafe { (self.destroy)(self.ptr) };
    }
}

/// Copy a response out, releasing it on every path.
fn read_guarded(
    ptr: *const JsonResponseHandle,
    read: ReadJsonResponseFn,
    destroy: DestroyJsonResponseFn,
) -> ClientResult<RawResponse> {
    let guard = ResponseGuard {
        ptr,
        destroy,
        _engine: PhantomData,
    };

    let response = unsafe { read(guard.ptr) };
    let json = unsafe { response.json.to_owned_string() }
        .map_err(|e| ClientError::malformed(format!("response is not UTF-8: {e}"), ""))?;
    debug!("Read response: success={}", response.is_success);

    Ok(RawResponse {
        is_success: response.is_success,
        json,
    })
}

/// One loaded instance of the native engine.
pub struct NativeEngine {
    path: PathBuf,
    platform: Platform,
    symbols: EngineSymbols,
    // Keeps the symbols valid; must outlive every call through them.
    _library: Library,
}

impl NativeEngine {
    /// Load the engine from `path`.
    ///
    /// Fails with `PlatformUnsupported` on an unmapped OS, and with
    /// `LibraryLoadFailure` naming the path and platform when the artifact is
    /// missing, cannot be loaded, or lacks an entry point.
    pub fn load<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let platform = Platform::current()?;
        let failure = |reason: String| ClientError::LibraryLoadFailure {
            path: path.display().to_string(),
            platform: platform.name().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(failure("artifact not found".to_string()));
        }

        info!("Loading engine library: {:?}", path);
        // SAFETY: loading runs the library's initialisers; the artifact is the
        // engine build this binding targets.
        let library = unsafe { Library::new(&path) }.map_err(|e| failure(e.to_string()))?;
        let symbols = unsafe { EngineSymbols::resolve(&library) }.map_err(failure)?;

        Ok(Self {
            path,
            platform,
            symbols,
            _library: library,
        })
    }

    /// Load the artifact for the current platform from the default directory.
    pub fn load_default() -> ClientResult<Self> {
        Self::load(default_library_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

impl Engine for NativeEngine {
    fn create_context(&self) -> ClientResult<RawContext> {
        let context = unsafe { (self.symbols.create_context)() };
        debug!("Created engine context {}", context);
        Ok(context)
    }

    fn destroy_context(&self, context: RawContext) {
        unsafe { (self.symbols.destroy_context)(context) };
        debug!("Destroyed engine context {}", context);
    }

    fn request(&self, context: RawContext, request: &EncodedRequest) -> ClientResult<RawResponse> {
        // Both buffers are borrowed from `request` and outlive the call.
        let method = InteropString::borrow(request.method())?;
        let params = InteropString::borrow(request.params())?;

        let ptr = unsafe { (self.symbols.json_request)(context, method, params) };
        if ptr.is_null() {
            return Err(ClientError::malformed("engine returned a null response", ""));
        }
        read_guarded(ptr, self.symbols.read_json_response, self.symbols.destroy_json_response)
    }

    fn request_async(
        &self,
        context: RawContext,
        request: &EncodedRequest,
        sink: EventSink,
    ) -> ClientResult<()> {
        let method = InteropString::borrow(request.method())?;
        let params = InteropString::borrow(request.params())?;

        // Registered first: the engine may answer before the call returns.
        let request_id = callback::register(sink);
        debug!("Async request {} on context {}", request_id, context);
        unsafe {
            (self.symbols.json_request_async)(
                context,
                method,
                params,
                request_id,
                callback::on_result,
            )
        };
        Ok(())
    }
}
