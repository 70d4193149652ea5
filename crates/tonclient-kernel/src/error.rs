//! Crate-level error types for the tonclient bridge.
//!
//! [`ClientError`] is the single error every layer returns: library loading,
//! context lifecycle, decoding, engine-reported failures and subscription
//! misuse. Engine errors keep their payload verbatim in
//! [`EngineErrorPayload`] so callers can match on engine error codes.

use crate::config::ConfigError;
use crate::handle::ContextHandle;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result alias used across the bridge.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The current OS has no library artifact mapping.
    #[error("No library for current platform \"{platform}\"")]
    PlatformUnsupported { platform: String },

    /// The native artifact is missing, incompatible or lacks a symbol.
    #[error("Failed to load engine library {path} on {platform}: {reason}")]
    LibraryLoadFailure {
        path: String,
        platform: String,
        reason: String,
    },

    /// Operation on a destroyed, unknown or foreign context handle.
    #[error("Context {0} is not valid")]
    ContextInvalid(ContextHandle),

    /// The engine produced text that could not be decoded.
    #[error("Malformed engine response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    /// The engine answered with `success = false`.
    #[error("Engine error: {0}")]
    Engine(EngineErrorPayload),

    /// Misuse of a subscription, or a failed registration.
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionFault),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A convenience input could not be adapted into request params.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// The engine payload, if this is an engine-reported error.
    pub fn engine_payload(&self) -> Option<&EngineErrorPayload> {
        match self {
            Self::Engine(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Subscription misuse and registration failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubscriptionFault {
    #[error("subscription {0} is already unsubscribed")]
    AlreadyUnsubscribed(u64),

    #[error("subscription registration failed: {0}")]
    RegistrationFailed(String),

    #[error("event stream closed before registration completed")]
    StreamClosed,
}

/// Error payload exactly as the engine reported it.
///
/// `raw` is the original JSON text. `value` is its parsed form. Both remain
/// untouched by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineErrorPayload {
    raw: String,
    value: Value,
}

impl EngineErrorPayload {
    /// Parse engine error text. Fails with `MalformedResponse` when the text
    /// is not JSON.
    pub fn parse(raw: impl Into<String>) -> ClientResult<Self> {
        let raw = raw.into();
        let value = serde_json::from_str(&raw)
            .map_err(|e| ClientError::malformed(format!("error payload: {e}"), raw.clone()))?;
        Ok(Self { raw, value })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Engine error code, when the payload carries one.
    pub fn code(&self) -> Option<i64> {
        self.value.get("code").and_then(Value::as_i64)
    }

    /// Engine error message, when the payload carries one.
    pub fn message(&self) -> Option<&str> {
        self.value.get("message").and_then(Value::as_str)
    }
}

impl fmt::Display for EngineErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "[{code}] {message}"),
            (None, Some(message)) => f.write_str(message),
            _ => f.write_str(&self.raw),
        }
    }
}
