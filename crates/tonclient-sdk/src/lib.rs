//! tonclient SDK
//!
//! ```text
//! TonClient --> modules (client, crypto, net, abi, processing)
//!     |               |
//!     v               v
//! ContextManager <----+---- subscriptions (dispatch threads)
//!     |
//!     v
//! tonclient_kernel::Engine (NativeEngine, MockEngine)
//! ```
//!
//! Contexts are created and destroyed through [`ContextManager`]. Handles are
//! generational, so a destroyed context is rejected with
//! `ClientError::ContextInvalid` instead of reaching the engine.

pub mod client;
pub mod manager;
pub mod modules;
pub mod subscription;

pub use client::TonClient;
pub use manager::ContextManager;
pub use modules::ClientContext;
pub use modules::crypto::{InputMessage, KeyPair};
pub use subscription::{
    ParamsOfSubscribeCollection, ResultOfSubscribeCollection, Subscription, SubscriptionCallback,
    SubscriptionState,
};

pub use tonclient_kernel::{
    ClientConfig, ClientError, ClientResult, ContextHandle, DEVNET_BASE_URL, Engine,
    MAINNET_BASE_URL, SubscriptionEvent, SubscriptionFault, SubscriptionResponseType,
};
