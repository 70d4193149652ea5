//! Request/response codec
//!
//! Requests travel as a method name plus JSON params. Both buffers cross the
//! boundary with an explicit byte length, so payloads may contain NUL bytes.
//! Responses come back as a success flag plus JSON text. Anything that does
//! not decode becomes [`ClientError::MalformedResponse`].

use crate::engine::{EngineEvent, RawContext, RawResponse};
use crate::error::{ClientError, ClientResult, EngineErrorPayload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A request bound to one engine context.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    context: RawContext,
    method: String,
    params: Value,
}

impl RequestEnvelope {
    /// Build an envelope. `Null` params are sent as an empty object.
    pub fn new(context: RawContext, method: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Self {
            context,
            method: method.into(),
            params,
        }
    }

    pub fn from_params<P: Serialize + ?Sized>(
        context: RawContext,
        method: impl Into<String>,
        params: &P,
    ) -> ClientResult<Self> {
        let params = serde_json::to_value(params)
            .map_err(|e| ClientError::InvalidInput(format!("params: {e}")))?;
        Ok(Self::new(context, method, params))
    }

    pub fn context(&self) -> RawContext {
        self.context
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn encode(&self) -> EncodedRequest {
        EncodedRequest {
            method: self.method.clone(),
            params: self.params.to_string(),
        }
    }
}

/// UTF-8 buffers ready to be lent across the foreign boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    method: String,
    params: String,
}

impl EncodedRequest {
    pub fn new(method: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: params.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// Params parsed back into a value.
    pub fn params_value(&self) -> ClientResult<Value> {
        serde_json::from_str(&self.params)
            .map_err(|e| ClientError::malformed(format!("request params: {e}"), self.params.clone()))
    }
}

/// Decoded engine response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(Value),
    Failure(EngineErrorPayload),
}

impl ResponseEnvelope {
    pub fn decode(is_success: bool, json: &str) -> ClientResult<Self> {
        if is_success {
            parse_value(json).map(Self::Success)
        } else {
            EngineErrorPayload::parse(json).map(Self::Failure)
        }
    }

    pub fn from_raw(raw: &RawResponse) -> ClientResult<Self> {
        Self::decode(raw.is_success, &raw.json)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> ClientResult<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(payload) => Err(ClientError::Engine(payload)),
        }
    }
}

// Void methods answer with an empty body.
fn parse_value(json: &str) -> ClientResult<Value> {
    if json.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(json).map_err(|e| ClientError::malformed(e.to_string(), json))
}

/// Map a decoded result onto a typed result struct.
pub fn decode_typed<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| ClientError::malformed(format!("result shape: {e}"), raw))
}

/// Engine response type codes for subscription deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SubscriptionResponseType {
    Ok = 100,
    Error = 101,
}

/// One delivery to a subscription callback.
#[derive(Debug)]
pub enum SubscriptionEvent {
    Ok(Value),
    Error(ClientError),
}

impl SubscriptionEvent {
    pub fn response_type(&self) -> SubscriptionResponseType {
        match self {
            Self::Ok(_) => SubscriptionResponseType::Ok,
            Self::Error(_) => SubscriptionResponseType::Error,
        }
    }

    pub fn ok(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Error(_) => None,
        }
    }
}

/// Decode one async event. `None` for a bare "finished" marker.
pub fn decode_event(event: &EngineEvent) -> Option<SubscriptionEvent> {
    if let Some(error) = event.error_json.as_deref().filter(|s| !s.is_empty()) {
        let err = match EngineErrorPayload::parse(error) {
            Ok(payload) => ClientError::Engine(payload),
            Err(malformed) => malformed,
        };
        return Some(SubscriptionEvent::Error(err));
    }
    let result = event.result_json.as_deref().filter(|s| !s.is_empty())?;
    Some(match parse_value(result) {
        Ok(value) => SubscriptionEvent::Ok(value),
        Err(malformed) => SubscriptionEvent::Error(malformed),
    })
}
