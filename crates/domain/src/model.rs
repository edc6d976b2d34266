//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Platform limit for a single post, in characters
pub const MAX_POST_CHARS: usize = 280;

/// Number of generated posts remembered to avoid repeats
pub const HISTORY_CAPACITY: usize = 10;

/// Number of history entries shown to the model in each prompt
pub const RECENT_POSTS_IN_PROMPT: usize = 3;

/// Persona and generation settings, fixed for the life of the process
#[derive(Debug, Clone)]
pub struct PersonaConfig {
    /// Persona / personality description
    pub system_prompt: String,
    /// Model identifier passed to the completion service
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum tokens in the completion
    pub max_tokens: u32,
    /// Maximum characters in a published post
    pub max_output_chars: usize,
    /// Completion attempts before giving up
    pub max_retries: u32,
    /// Base delay for exponential backoff between completion attempts
    pub backoff_base: Duration,
}

impl PersonaConfig {
    pub const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";

    /// Create a persona with default sampling settings
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: model.into(),
            temperature: 0.8,
            max_tokens: 100,
            max_output_chars: MAX_POST_CHARS,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Sampling parameters for one completion request
    pub fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
        }
    }
}

/// Role of a message in a chat conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Ordered conversation sent to the completion service.
///
/// Built fresh for every generation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationRequest {
    messages: Vec<ChatMessage>,
}

impl ConversationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Content of the first message with the given role
    pub fn content_for(&self, role: ChatRole) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}

/// Sampling and retry parameters for a completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

/// Bounded FIFO of recently generated posts
#[derive(Debug, Clone)]
pub struct PostHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl PostHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a post, evicting the oldest entry when full
    pub fn push(&mut self, post: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(post.into());
    }

    /// The last `n` posts, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &str> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PostHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

/// Lifecycle of the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Uninitialized,
    Connected,
    Running,
    Stopped,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BotState::Uninitialized => "uninitialized",
            BotState::Connected => "connected",
            BotState::Running => "running",
            BotState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Running totals of cycle outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub attempted: u64,
    pub published: u64,
    pub generation_failures: u64,
    pub publish_failures: u64,
    pub panics: u64,
}
