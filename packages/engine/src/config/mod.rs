//! Engine configuration
//!
//! One explicitly constructed [`EngineConfig`] is handed to each engine at
//! construction time; there is no ambient static configuration state.

use std::time::Duration;

use thiserror::Error;

/// How the engine interacts with the cookie store around a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieMode {
    /// Send stored cookies and persist `Set-Cookie` response headers.
    #[default]
    Auto,
    /// Neither send nor persist cookies.
    Ignore,
    /// Send stored cookies but never persist incoming ones.
    OnlySendWithoutReceive,
}

/// How an async send surfaces an HTTP-level or recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// The returned future rejects with the recorded fault.
    #[default]
    Reject,
    /// The returned future resolves with the failed context instead.
    Resolve,
}

/// Process-wide engine configuration.
///
/// Validated once when the engine is constructed; see [`EngineConfig::validate`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default attempt bound used by the retry coordinator.
    pub retry_count: u32,
    /// Default sleep between retry attempts.
    pub retry_delay: Duration,
    /// Watchdog window for obtaining response headers.
    pub request_timeout: Duration,
    /// Per-chunk read/write deadline on body transfer.
    pub read_write_timeout: Duration,
    /// Content type assumed for untyped payloads that reach the object
    /// fallback of negotiation.
    pub default_content_type: DefaultContentType,
    /// Cookie store interaction policy.
    pub cookie_mode: CookieMode,
    /// Follow 3xx responses by resubmitting the context.
    pub auto_redirect: bool,
    /// Hop bound for auto-followed redirects.
    pub max_redirects: u32,
    /// Decode gzip/deflate response bodies before materialization.
    pub auto_decompress: bool,
    /// Sampling interval of the transfer speed monitor.
    pub speed_sample_interval: Duration,
    /// Upper bound for a single chunk moved by the streaming layer.
    pub chunk_size: usize,
    /// Cap on the progress mirror buffer; larger bodies are not mirrored.
    pub mirror_buffer_cap: usize,
    /// Whether async sends reject with the fault or resolve with the
    /// failed context.
    pub failure_mode: FailureMode,
}

/// Content type applied to untyped payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultContentType {
    #[default]
    Json,
    Xml,
    Form,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            read_write_timeout: Duration::from_secs(30),
            default_content_type: DefaultContentType::default(),
            cookie_mode: CookieMode::default(),
            auto_redirect: true,
            max_redirects: 10,
            auto_decompress: true,
            speed_sample_interval: Duration::from_millis(500),
            chunk_size: 16 * 1024,
            mirror_buffer_cap: 4 * 1024 * 1024,
            failure_mode: FailureMode::default(),
        }
    }
}

/// Configuration validation failures.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
    #[error("read/write timeout must be greater than zero")]
    ZeroReadWriteTimeout,
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("speed sample interval must be greater than zero")]
    ZeroSampleInterval,
    #[error("max redirects must be greater than zero when auto redirect is enabled")]
    ZeroMaxRedirects,
}

impl EngineConfig {
    /// Checks parameter consistency before an engine is built around this
    /// configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if self.read_write_timeout.is_zero() {
            return Err(ConfigError::ZeroReadWriteTimeout);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.speed_sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.auto_redirect && self.max_redirects == 0 {
            return Err(ConfigError::ZeroMaxRedirects);
        }
        Ok(())
    }
}
