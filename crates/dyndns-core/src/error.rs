//! Error types for the dynamic DNS pipeline
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dynamic DNS pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed prefix or mask input for address synthesis
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Gateway query failed or timed out
    #[error("Gateway source error: {0}")]
    Source(String),

    /// DNS provider lookup (zone or record listing) failed
    #[error("DNS provider query error: {0}")]
    ProviderQuery(String),

    /// DNS provider create or update failed
    #[error("DNS provider write error: {0}")]
    ProviderWrite(String),

    /// Configuration errors, including zone resolution at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dispatch queue is full and the policy rejects instead of waiting
    #[error("Dispatch queue full")]
    QueueFull,

    /// The consumer side of the dispatch queue is gone
    #[error("Dispatch queue closed")]
    QueueClosed,

    /// A bounded call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a synthesis error
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Create a gateway source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a provider query error
    pub fn provider_query(msg: impl Into<String>) -> Self {
        Self::ProviderQuery(msg.into())
    }

    /// Create a provider write error
    pub fn provider_write(msg: impl Into<String>) -> Self {
        Self::ProviderWrite(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
