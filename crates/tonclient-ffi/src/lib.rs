//! tonclient FFI - native engine bindings
//!
//! ```text
//! tonclient-sdk (ContextManager, modules)
//!     |
//!     v
//! tonclient-kernel::Engine
//!     |
//!     v
//! NativeEngine --libloading--> ton-rust-client-<version>.{so,dylib,dll}
//! ```
//!
//! The library is loaded once per [`NativeEngine`]. Symbols are resolved up
//! front, so a missing entry point fails at load time instead of at the first
//! request.

mod callback;
pub mod interop;
pub mod library;
pub mod platform;

pub use callback::is_pending;
pub use library::NativeEngine;
pub use platform::{LIB_DIR_ENV, LIB_VERSION, Platform, default_library_path, library_path_in};
