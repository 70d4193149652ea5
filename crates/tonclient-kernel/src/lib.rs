//! tonclient kernel
//!
//! Shared building blocks of the bridge: the [`Engine`](engine::Engine) seam,
//! the request/response codec, the generational handle table, the error
//! taxonomy and [`ClientConfig`](config::ClientConfig).

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;

pub use codec::{
    EncodedRequest, RequestEnvelope, ResponseEnvelope, SubscriptionEvent,
    SubscriptionResponseType, decode_event, decode_typed,
};
pub use config::{ClientConfig, DEVNET_BASE_URL, MAINNET_BASE_URL};
pub use engine::{Engine, EngineEvent, EventSink, RawContext, RawResponse};
pub use error::{ClientError, ClientResult, EngineErrorPayload, SubscriptionFault};
pub use handle::{ContextHandle, HandleTable};
