//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{CompletionParams, ConversationRequest};

/// Error type for completion operations
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<CompletionError>,
    },
}

/// Port for chat-style text generation.
///
/// Implementations own the retry policy: they make up to
/// `params.max_retries` attempts with exponential backoff and only return an
/// error once every attempt has failed.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        conversation: &ConversationRequest,
        params: &CompletionParams,
    ) -> Result<String, CompletionError>;
}

/// Error type for publisher operations
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Publisher not connected")]
    NotConnected,
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },
}

/// Result of a successful publish operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Platform-specific post ID
    pub id: String,
    /// URL to the published content, if available
    pub url: Option<String>,
}

/// Port for publishing posts to a social platform
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Establish the session used by `publish`
    async fn connect(&self) -> Result<(), PublishError>;

    /// Publish a single post. Makes exactly one attempt.
    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError>;

    /// Best-effort credential check; false on any error
    async fn verify_credentials(&self) -> bool;

    /// Get the platform name (e.g., "x")
    fn platform(&self) -> &'static str;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
