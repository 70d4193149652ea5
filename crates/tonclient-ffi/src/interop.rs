//! C ABI types shared with the native engine
//!
//! Strings cross the boundary as `{pointer, length}` pairs, never as
//! NUL-terminated buffers. A string passed *to* the engine stays owned by
//! the caller until the call returns. A string received *from* the engine is
//! only valid until the owning response is destroyed or the callback
//! returns, so it is copied out immediately.

use std::str::Utf8Error;
use tonclient_kernel::{ClientError, ClientResult};

/// Callback flag: no further results for this request id.
pub const FLAG_FINISHED: i32 = 1;

/// Length-prefixed UTF-8 string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InteropString {
    pub content: *const u8,
    pub len: u32,
}

impl InteropString {
    /// Borrow `text` for the duration of one foreign call.
    pub fn borrow(text: &str) -> ClientResult<Self> {
        let len = u32::try_from(text.len()).map_err(|_| {
            ClientError::InvalidInput(format!("string of {} bytes exceeds the ABI limit", text.len()))
        })?;
        Ok(Self {
            content: text.as_ptr(),
            len,
        })
    }

    pub fn empty() -> Self {
        Self {
            content: std::ptr::null(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_null() || self.len == 0
    }

    /// # Safety
    /// `content` must point to `len` readable bytes for the duration of the
    /// call.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.is_empty() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.content, self.len as usize) }
    }

    /// Copy the string out, rejecting invalid UTF-8.
    ///
    /// # Safety
    /// Same as [`InteropString::as_bytes`].
    pub unsafe fn to_owned_string(&self) -> Result<String, Utf8Error> {
        let bytes = unsafe { self.as_bytes() };
        std::str::from_utf8(bytes).map(str::to_owned)
    }
}

/// Engine-owned response, opaque on this side.
#[repr(C)]
pub struct JsonResponseHandle {
    _private: [u8; 0],
}

/// View of a response as returned by `tc_read_json_response`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InteropJsonResponse {
    pub is_success: bool,
    pub json: InteropString,
}

/// Result callback of `tc_json_request_async`.
pub type OnResult = extern "C" fn(
    request_id: i32,
    result_json: InteropString,
    error_json: InteropString,
    flags: i32,
);
