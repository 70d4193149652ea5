//! The `TonClient` entry point.

use crate::manager::ContextManager;
use crate::modules::ClientContext;
use crate::modules::abi::AbiModule;
use crate::modules::client::ClientModule;
use crate::modules::crypto::CryptoModule;
use crate::modules::net::NetModule;
use crate::modules::processing::ProcessingModule;
use std::path::Path;
use std::sync::Arc;
use tonclient_ffi::NativeEngine;
use tonclient_kernel::{ClientConfig, ClientResult, ContextHandle, Engine};

/// One configured engine context plus its module facades.
///
/// ```no_run
/// # async fn run() -> tonclient_sdk::ClientResult<()> {
/// use tonclient_sdk::{ClientConfig, DEVNET_BASE_URL, TonClient};
///
/// let client = TonClient::from_default_library(ClientConfig::default().with_servers([DEVNET_BASE_URL]))?;
/// let version = client.client().version().await?;
/// println!("engine {}", version.version);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TonClient {
    context: ClientContext,
}

impl TonClient {
    /// Create a client on its own manager over `engine`.
    pub fn new(engine: Arc<dyn Engine>, config: ClientConfig) -> ClientResult<Self> {
        Self::with_manager(Arc::new(ContextManager::new(engine)), config)
    }

    /// Create a client on a shared manager.
    pub fn with_manager(manager: Arc<ContextManager>, config: ClientConfig) -> ClientResult<Self> {
        let handle = manager.create(config)?;
        Ok(Self {
            context: ClientContext::new(manager, handle),
        })
    }

    /// Load the engine library at `path` and create a client on it.
    pub fn from_library(path: impl AsRef<Path>, config: ClientConfig) -> ClientResult<Self> {
        let engine = NativeEngine::load(path)?;
        Self::new(Arc::new(engine), config)
    }

    /// Load the engine library for the current platform from the default
    /// directory (`TONCLIENT_LIB_DIR` or `bin`).
    pub fn from_default_library(config: ClientConfig) -> ClientResult<Self> {
        let engine = NativeEngine::load_default()?;
        Self::new(Arc::new(engine), config)
    }

    pub fn handle(&self) -> ContextHandle {
        self.context.handle()
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn config(&self) -> ClientResult<ClientConfig> {
        self.context.manager().config(self.context.handle())
    }

    /// Destroy the context now instead of on last drop.
    pub fn destroy(&self) -> ClientResult<()> {
        self.context.destroy()
    }

    pub fn client(&self) -> ClientModule {
        ClientModule::new(self.context.clone())
    }

    pub fn crypto(&self) -> CryptoModule {
        CryptoModule::new(self.context.clone())
    }

    pub fn net(&self) -> NetModule {
        NetModule::new(self.context.clone())
    }

    pub fn abi(&self) -> AbiModule {
        AbiModule::new(self.context.clone())
    }

    pub fn processing(&self) -> ProcessingModule {
        ProcessingModule::new(self.context.clone())
    }
}
