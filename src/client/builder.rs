//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring a [`SessionConfig`] passed to
//! [`Client::initialize`](super::Client::initialize).
//!
//! # Example
//!
//! ```no_run
//! use gamesparks_rt::{Client, SessionConfig};
//!
//! # async fn example() -> gamesparks_rt::Result<()> {
//! let config = SessionConfig::builder()
//!     .preview("exampleKey")
//!     .secret("exampleSecret")
//!     .on_authenticated(|session_id| println!("authenticated as {session_id}"))
//!     .on_message(|message| println!("push: {}", message.class()))
//!     .build()?;
//!
//! let client = Client::new();
//! client.initialize(config);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{HmacSigner, NonceSigner};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::identity::{HostIdentity, IdentityProvider};
use crate::protocol::Message;
use crate::transport::{Transport, WebSocketTransport};

use super::endpoint::Endpoint;
use super::keepalive::DEFAULT_KEEPALIVE_INTERVAL;
use super::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for a correlated response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(32);

// ============================================================================
// Handler Types
// ============================================================================

/// Called once per successful handshake.
pub type AuthenticatedHandler = Arc<dyn Fn(&SessionId) + Send + Sync>;

/// Called for every server-initiated message.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Called for connection-level errors.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

// ============================================================================
// SessionConfig
// ============================================================================

/// Validated session configuration.
///
/// Use [`SessionConfig::builder()`] to create one.
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) endpoint: Endpoint,
    pub(crate) signer: Arc<dyn NonceSigner>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) on_authenticated: Option<AuthenticatedHandler>,
    pub(crate) on_message: Option<MessageHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) request_timeout: Duration,
    pub(crate) keepalive_interval: Duration,
    pub(crate) reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Returns the configured (load-balancer) endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the response deadline.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the keepalive interval.
    #[inline]
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionConfigBuilder
// ============================================================================

/// Builder for a [`SessionConfig`].
#[derive(Default, Clone)]
pub struct SessionConfigBuilder {
    endpoint: Option<String>,
    secret: Option<String>,
    signer: Option<Arc<dyn NonceSigner>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    transport: Option<Arc<dyn Transport>>,
    on_authenticated: Option<AuthenticatedHandler>,
    on_message: Option<MessageHandler>,
    on_error: Option<ErrorHandler>,
    request_timeout: Option<Duration>,
    keepalive_interval: Option<Duration>,
    reconnect: ReconnectPolicy,
}

impl SessionConfigBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the socket URL.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Targets the preview stage for an application key.
    #[inline]
    #[must_use]
    pub fn preview(mut self, api_key: &str) -> Self {
        self.endpoint = Some(Endpoint::preview(api_key).as_str().to_string());
        self
    }

    /// Targets the live stage for an application key.
    #[inline]
    #[must_use]
    pub fn live(mut self, api_key: &str) -> Self {
        self.endpoint = Some(Endpoint::live(api_key).as_str().to_string());
        self
    }

    /// Sets the shared secret used by the built-in HMAC signer.
    #[inline]
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Replaces the built-in HMAC signer.
    ///
    /// Any `Fn(&str) -> String` works.
    #[inline]
    #[must_use]
    pub fn nonce_signer(mut self, signer: impl NonceSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Sets the platform/OS identity source.
    ///
    /// Defaults to [`HostIdentity`].
    #[inline]
    #[must_use]
    pub fn identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Sets the transport.
    ///
    /// Defaults to [`WebSocketTransport`].
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the authenticated handler.
    #[inline]
    #[must_use]
    pub fn on_authenticated(mut self, handler: impl Fn(&SessionId) + Send + Sync + 'static) -> Self {
        self.on_authenticated = Some(Arc::new(handler));
        self
    }

    /// Sets the server-message handler.
    #[inline]
    #[must_use]
    pub fn on_message(mut self, handler: impl Fn(Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(handler));
        self
    }

    /// Sets the connection-error handler.
    #[inline]
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Sets the response deadline (default 32s).
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the keepalive interval (default 30s).
    #[inline]
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Sets the reconnect policy (default [`ReconnectPolicy::Immediate`]).
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint is set or it is not a WebSocket URL
    /// - [`Error::Config`] if neither a secret nor a nonce signer is set
    /// - [`Error::Config`] if a duration is zero
    pub fn build(self) -> Result<SessionConfig> {
        let endpoint = self.validate_endpoint()?;
        let signer = self.validate_signer()?;
        let request_timeout =
            validate_duration("request_timeout", self.request_timeout, DEFAULT_REQUEST_TIMEOUT)?;
        let keepalive_interval = validate_duration(
            "keepalive_interval",
            self.keepalive_interval,
            DEFAULT_KEEPALIVE_INTERVAL,
        )?;

        Ok(SessionConfig {
            endpoint,
            signer,
            identity: self.identity.unwrap_or_else(|| Arc::new(HostIdentity)),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(WebSocketTransport::new())),
            on_authenticated: self.on_authenticated,
            on_message: self.on_message,
            on_error: self.on_error,
            request_timeout,
            keepalive_interval,
            reconnect: self.reconnect,
        })
    }
}

impl fmt::Debug for SessionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfigBuilder")
            .field("endpoint", &self.endpoint)
            .field("has_secret", &self.secret.is_some())
            .field("has_signer", &self.signer.is_some())
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionConfigBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Endpoint> {
        let url = self.endpoint.as_deref().ok_or_else(|| {
            Error::config(
                "Endpoint is required. Use .endpoint(), .preview() or .live() to set it.\n\
                 Example: SessionConfig::builder().live(\"apiKey\")",
            )
        })?;

        Endpoint::parse(url)
    }

    /// Validates the signing configuration. A custom signer wins over a secret.
    fn validate_signer(&self) -> Result<Arc<dyn NonceSigner>> {
        if let Some(signer) = &self.signer {
            return Ok(Arc::clone(signer));
        }

        match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(Arc::new(HmacSigner::new(secret))),
            _ => Err(Error::config(
                "Shared secret is required unless a nonce signer is set. \
                 Use .secret() or .nonce_signer().",
            )),
        }
    }
}

/// Applies a default and rejects zero durations.
fn validate_duration(name: &str, value: Option<Duration>, default: Duration) -> Result<Duration> {
    match value {
        Some(duration) if duration.is_zero() => {
            Err(Error::config(format!("{name} must be greater than zero")))
        }
        Some(duration) => Ok(duration),
        None => Ok(default),
    }
}

// ============================================================================
// Tests
// ============================================================================
