//! Stub completer for testing and offline mode

use async_trait::async_trait;
use persona_bot_domain::{
    ChatRole, CompletionError, CompletionParams, CompletionService, ConversationRequest,
};
use std::sync::atomic::{AtomicU64, Ordering};

enum Mode {
    Fixed(String),
    Failing(CompletionError),
    PersonaEcho,
}

/// Stub completer that returns configurable responses
pub struct StubCompleter {
    mode: Mode,
    calls: AtomicU64,
}

impl StubCompleter {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            calls: AtomicU64::new(0),
        }
    }

    /// Always return the same text
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_mode(Mode::Fixed(text.into()))
    }

    /// Always fail with the given error
    pub fn failing(error: CompletionError) -> Self {
        Self::with_mode(Mode::Failing(error))
    }

    /// Produce a numbered post built from the first line of the persona
    pub fn persona_echo() -> Self {
        Self::with_mode(Mode::PersonaEcho)
    }
}

impl Default for StubCompleter {
    fn default() -> Self {
        Self::persona_echo()
    }
}

#[async_trait]
impl CompletionService for StubCompleter {
    async fn complete(
        &self,
        conversation: &ConversationRequest,
        _params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.mode {
            Mode::Fixed(text) => Ok(text.clone()),
            Mode::Failing(error) => Err(error.clone()),
            Mode::PersonaEcho => {
                let persona = conversation
                    .content_for(ChatRole::User)
                    .and_then(|prompt| prompt.lines().map(str::trim).find(|l| !l.is_empty()))
                    .unwrap_or("Persona");
                Ok(format!("{} (stub post #{})", persona, n))
            }
        }
    }
}
