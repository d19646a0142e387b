//! The engine
//!
//! An [`Engine`] binds one configuration to one transport, one cookie
//! store, one hook registry and one negotiator, and owns the shared worker
//! pool async sends run on. There is no ambient global engine: construct
//! one and pass it around.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::context::RequestContext;
use crate::cookie::{CookieStore, Jar};
use crate::hooks::Hooks;
use crate::http::request::Request;
use crate::negotiate::Negotiator;
use crate::retry::{send_with_retry, RetryOutcome, RetryPolicy};
use crate::transport::{HandleRegistry, Transport};

/// Everything a live context needs from its engine.
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cookies: Arc<dyn CookieStore>,
    pub(crate) hooks: Hooks,
    pub(crate) negotiator: Negotiator,
    pub(crate) registry: HandleRegistry,
}

/// Failures constructing an engine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("an engine needs a transport")]
    MissingTransport,
    #[error("failed to start the worker pool: {0}")]
    Worker(#[from] std::io::Error),
}

/// Builds an [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    transport: Option<Arc<dyn Transport>>,
    cookies: Option<Arc<dyn CookieStore>>,
    hooks: Hooks,
    negotiator: Negotiator,
}

impl EngineBuilder {
    /// Replaces the default configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the transport collaborator. Required.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the in-memory cookie jar.
    #[must_use]
    pub fn cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Mutable access to the hook registry; hooks are fixed once built.
    pub fn hooks(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Mutable access to the negotiator, for registering per-type content
    /// builders.
    pub fn negotiator(&mut self) -> &mut Negotiator {
        &mut self.negotiator
    }

    /// Validates the configuration and builds the engine.
    pub fn build(self) -> Result<Engine, BuildError> {
        self.config.validate()?;
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        Ok(Engine {
            shared: Arc::new(Shared {
                config: self.config,
                transport,
                cookies: self
                    .cookies
                    .unwrap_or_else(|| Arc::new(Jar::new()) as Arc<dyn CookieStore>),
                hooks: self.hooks,
                negotiator: self.negotiator,
                registry: HandleRegistry::new(),
            }),
            worker: OnceLock::new(),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            transport: None,
            cookies: None,
            hooks: Hooks::new(),
            negotiator: Negotiator::new(),
        }
    }
}

/// The request execution engine.
pub struct Engine {
    shared: Arc<Shared>,
    worker: OnceLock<tokio::runtime::Runtime>,
}

impl Engine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Creates the context that will execute `request`.
    #[must_use]
    pub fn context(&self, request: Request) -> RequestContext {
        RequestContext::new(Arc::clone(&self.shared), request)
    }

    /// Sends `request`, blocking the calling thread on the worker pool.
    ///
    /// Must not be called from async code; use [`Engine::send_async`] or
    /// [`Engine::spawn`] there.
    pub fn send(&self, request: Request) -> RequestContext {
        self.worker().block_on(self.send_async(request))
    }

    /// Sends `request` and resolves with the finished context.
    pub async fn send_async(&self, request: Request) -> RequestContext {
        let mut context = self.context(request);
        context.run_to_completion().await;
        context
    }

    /// Dispatches `request` onto the worker pool and returns immediately.
    pub fn spawn(&self, request: Request) -> tokio::task::JoinHandle<RequestContext> {
        let mut context = self.context(request);
        self.worker()
            .spawn(async move {
                context.run_to_completion().await;
                context
            })
    }

    /// Runs the bounded retry loop: fresh context per attempt, the default
    /// success classification, `on_retry` once per failed attempt that is
    /// retried.
    pub async fn send_with_retry<G, R>(
        &self,
        policy: &RetryPolicy,
        mut make_request: G,
        on_retry: R,
    ) -> (RequestContext, RetryOutcome)
    where
        G: FnMut() -> Request,
        R: FnMut(u32),
    {
        send_with_retry(
            policy,
            || self.context(make_request()),
            RequestContext::is_success,
            on_retry,
        )
        .await
    }

    /// Blocking variant of [`Engine::send_with_retry`].
    pub fn send_with_retry_blocking<G, R>(
        &self,
        policy: &RetryPolicy,
        make_request: G,
        on_retry: R,
    ) -> (RequestContext, RetryOutcome)
    where
        G: FnMut() -> Request,
        R: FnMut(u32),
    {
        self.worker()
            .block_on(self.send_with_retry(policy, make_request, on_retry))
    }

    fn worker(&self) -> &tokio::runtime::Runtime {
        self.worker.get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("quiver-worker")
                .build()
                .unwrap_or_else(|e| panic!("failed to start the quiver worker pool: {e}"))
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .finish()
    }
}
