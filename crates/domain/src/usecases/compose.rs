//! Post composition use case

use std::sync::Arc;

use time::{UtcOffset, macros::format_description};

use crate::{
    model::{ChatMessage, ConversationRequest, PersonaConfig, PostHistory, RECENT_POSTS_IN_PROMPT},
    policy::PostPolicy,
    ports::{Clock, CompletionService},
};

/// Instruction sent as the system message of every request
pub const SYSTEM_INSTRUCTION: &str =
    "You are a social media post generator. Generate only the post text, nothing else.";

/// Builds prompts from persona and history, and turns completions into posts
pub struct PostComposer<C, Cl>
where
    C: CompletionService + ?Sized,
    Cl: Clock + ?Sized,
{
    completer: Arc<C>,
    clock: Arc<Cl>,
    persona: PersonaConfig,
    policy: PostPolicy,
    history: PostHistory,
}

impl<C, Cl> PostComposer<C, Cl>
where
    C: CompletionService + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(completer: Arc<C>, clock: Arc<Cl>, persona: PersonaConfig) -> Self {
        let policy = PostPolicy::new(persona.max_output_chars);
        Self {
            completer,
            clock,
            persona,
            policy,
            history: PostHistory::default(),
        }
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn history(&self) -> &PostHistory {
        &self.history
    }

    /// Build the conversation for the next generation
    pub fn build_prompt(&self) -> ConversationRequest {
        let now = self.clock.now().to_offset(UtcOffset::UTC);
        let timestamp = now
            .format(format_description!(
                "[weekday], [month repr:long] [day], [year] at [hour repr:12]:[minute] [period]"
            ))
            .unwrap_or_else(|_| now.to_string());

        let mut prompt = String::new();
        prompt.push_str(&self.persona.system_prompt);
        prompt.push_str("\n\n");
        prompt.push_str(&format!("Current time: {} UTC\n\n", timestamp));

        prompt.push_str("Generate an engaging post that:\n");
        for line in self.policy.requirements() {
            prompt.push_str(&line);
            prompt.push('\n');
        }

        if !self.history.is_empty() {
            prompt.push_str("\nRecent posts to avoid repeating:\n");
            for post in self.history.recent(RECENT_POSTS_IN_PROMPT) {
                prompt.push_str(&format!("- {}\n", post));
            }
        }

        prompt.push_str("\nPost:");

        ConversationRequest::new(vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(prompt),
        ])
    }

    /// Normalize raw completion text into a publishable post
    pub fn normalize(&self, raw: &str) -> String {
        self.policy.normalize(raw)
    }

    /// Generate the next post, recording it in history on success
    pub async fn generate(&mut self) -> Option<String> {
        let conversation = self.build_prompt();
        let params = self.persona.completion_params();

        let raw = match self.completer.complete(&conversation, &params).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "Post generation failed");
                return None;
            }
        };

        let post = self.normalize(&raw);
        if post.trim().is_empty() {
            tracing::warn!(raw = %raw, "Completion was empty after normalization");
            return None;
        }

        self.history.push(post.clone());

        tracing::debug!(
            chars = post.chars().count(),
            history_len = self.history.len(),
            "Generated post"
        );

        Some(post)
    }
}
