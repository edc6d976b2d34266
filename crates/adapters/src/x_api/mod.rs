//! X (Twitter) API adapters

mod oauth;
mod write;

pub use oauth::OAuth1Credentials;
pub use write::XPublisher;

use async_trait::async_trait;
use persona_bot_domain::{MAX_POST_CHARS, PublishError, PublishResult, Publisher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stub X publisher for dry runs and tests; records posts instead of sending them
pub struct StubXPublisher {
    connected: AtomicBool,
    max_chars: usize,
    published: Mutex<Vec<String>>,
}

impl StubXPublisher {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            max_chars: MAX_POST_CHARS,
            published: Mutex::new(vec![]),
        }
    }

    /// Get all posts that were published
    pub fn get_published(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for StubXPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for StubXPublisher {
    async fn connect(&self) -> Result<(), PublishError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PublishError::NotConnected);
        }

        let len = text.chars().count();
        if len > self.max_chars {
            return Err(PublishError::ContentTooLong {
                len,
                max: self.max_chars,
            });
        }

        tracing::info!(chars = len, "[DRY RUN] Would publish: {}", text);

        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        published.push(text.to_string());
        let id = format!("stub_{}", published.len());

        Ok(PublishResult {
            url: Some(format!("https://x.com/stub/status/{}", id)),
            id,
        })
    }

    async fn verify_credentials(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn platform(&self) -> &'static str {
        "x"
    }
}
