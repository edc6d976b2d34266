//! Subcommand implementations

pub mod compose;
pub mod config;
pub mod doctor;
pub mod run;

use anyhow::{Context, Result, bail};
use persona_bot_adapters::{
    llm::{LlmConfig, OpenAiCompleter, StubCompleter},
    x::{StubXPublisher, XPublisher},
};
use persona_bot_domain::{CompletionService, Publisher};
use std::sync::Arc;

use crate::config::{AppConfig, ResolvedEnv};

pub(crate) fn build_completer(
    config: &AppConfig,
    env: &ResolvedEnv,
) -> Result<Arc<dyn CompletionService>> {
    match config.llm.provider.as_str() {
        "openai" => {
            let api_key = env
                .openai_api_key
                .clone()
                .with_context(|| format!("Missing API key env var {}", config.llm.api_key_env))?;
            let completer = OpenAiCompleter::with_base_url(
                api_key,
                config.llm.base_url.clone(),
                LlmConfig {
                    timeout_secs: config.llm.timeout_secs,
                },
            )
            .context("Failed to initialize OpenAI client")?;
            Ok(Arc::new(completer))
        }
        "stub" => Ok(Arc::new(StubCompleter::persona_echo())),
        other => bail!("Unknown LLM provider: {} (expected openai or stub)", other),
    }
}

pub(crate) fn build_publisher(
    config: &AppConfig,
    env: &ResolvedEnv,
    dry_run: bool,
) -> Result<Arc<dyn Publisher>> {
    if dry_run {
        return Ok(Arc::new(StubXPublisher::new()));
    }

    let credentials = env.x.clone().context("X credentials were not resolved")?;
    Ok(Arc::new(XPublisher::with_base_url(
        credentials,
        config.x.base_url.clone(),
        config.x.max_chars,
    )))
}
