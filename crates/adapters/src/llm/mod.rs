//! LLM provider adapters

pub mod openai;
pub mod stub;

pub use openai::OpenAiCompleter;
pub use stub::StubCompleter;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport settings shared by HTTP completion adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { timeout_secs: 45 }
    }
}

/// Delay before the retry that follows attempt `attempt` (counted from 0)
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt))
}
