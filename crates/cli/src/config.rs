//! Configuration loading and management

use anyhow::{Context, Result};
use persona_bot_adapters::x::OAuth1Credentials;
use persona_bot_domain::{MAX_POST_CHARS, PersonaConfig, usecases::ScheduleConfig};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub persona: PersonaSection,

    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub x: XSection,

    #[serde(default)]
    pub schedule: ScheduleSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSection {
    #[serde(default = "default_system_prompt_env")]
    pub system_prompt_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model_env")]
    pub model_env: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XSection {
    #[serde(default = "default_x_bearer_token_env")]
    pub bearer_token_env: String,

    #[serde(default = "default_x_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_x_api_secret_env")]
    pub api_secret_env: String,

    #[serde(default = "default_x_access_token_env")]
    pub access_token_env: String,

    #[serde(default = "default_x_access_token_secret_env")]
    pub access_token_secret_env: String,

    #[serde(default = "default_x_base_url")]
    pub base_url: String,

    #[serde(default = "default_x_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_poll")]
    pub poll_secs: u64,

    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_system_prompt_env() -> String {
    "SYSTEM_PROMPT".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model_env() -> String {
    "OPENAI_MODEL".to_string()
}

fn default_model() -> String {
    PersonaConfig::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f64 {
    0.8
}

fn default_max_output_tokens() -> u32 {
    100
}

fn default_llm_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1
}

fn default_timeout() -> u64 {
    45
}

fn default_x_bearer_token_env() -> String {
    "TWITTER_BEARER_TOKEN".to_string()
}

fn default_x_api_key_env() -> String {
    "TWITTER_API_KEY".to_string()
}

fn default_x_api_secret_env() -> String {
    "TWITTER_API_SECRET".to_string()
}

fn default_x_access_token_env() -> String {
    "TWITTER_ACCESS_TOKEN".to_string()
}

fn default_x_access_token_secret_env() -> String {
    "TWITTER_ACCESS_TOKEN_SECRET".to_string()
}

fn default_x_base_url() -> String {
    "https://api.twitter.com".to_string()
}

fn default_x_max_chars() -> usize {
    280
}

fn default_interval() -> u64 {
    3600
}

fn default_poll() -> u64 {
    60
}

fn default_error_backoff() -> u64 {
    300
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl Default for PersonaSection {
    fn default() -> Self {
        Self {
            system_prompt_env: default_system_prompt_env(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key_env: default_api_key_env(),
            model_env: default_model_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            retries: default_llm_retries(),
            backoff_base_secs: default_backoff_base(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for XSection {
    fn default() -> Self {
        Self {
            bearer_token_env: default_x_bearer_token_env(),
            api_key_env: default_x_api_key_env(),
            api_secret_env: default_x_api_secret_env(),
            access_token_env: default_x_access_token_env(),
            access_token_secret_env: default_x_access_token_secret_env(),
            base_url: default_x_base_url(),
            max_chars: default_x_max_chars(),
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            poll_secs: default_poll(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

/// A required environment variable that was absent or blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVar {
    pub name: String,
    pub description: &'static str,
}

/// Smallest `x.max_chars` that still leaves room for text before the ellipsis
pub const MIN_OUTPUT_CHARS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables:\n{}", format_missing(.0))]
    MissingVars(Vec<MissingVar>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn format_missing(missing: &[MissingVar]) -> String {
    missing
        .iter()
        .map(|m| format!("  - {} ({})", m.name, m.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which collaborators a command is going to build
#[derive(Debug, Clone, Copy)]
pub struct Needs {
    pub completion: bool,
    pub publishing: bool,
}

/// Values resolved from the environment at startup
#[derive(Debug, Clone)]
pub struct ResolvedEnv {
    pub system_prompt: String,
    pub model: String,
    pub openai_api_key: Option<SecretString>,
    pub x: Option<OAuth1Credentials>,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PERSONA_BOT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn uses_stub_llm(&self) -> bool {
        self.llm.provider == "stub"
    }

    /// Required environment variables for the given needs, with descriptions
    pub fn required_vars(&self, needs: Needs) -> Vec<(&str, &'static str)> {
        let mut vars = vec![(
            self.persona.system_prompt_env.as_str(),
            "Bot persona/personality description",
        )];

        if needs.publishing {
            vars.extend([
                (self.x.bearer_token_env.as_str(), "Twitter API Bearer Token"),
                (self.x.api_key_env.as_str(), "Twitter API Key"),
                (self.x.api_secret_env.as_str(), "Twitter API Secret"),
                (self.x.access_token_env.as_str(), "Twitter Access Token"),
                (
                    self.x.access_token_secret_env.as_str(),
                    "Twitter Access Token Secret",
                ),
            ]);
        }

        if needs.completion && !self.uses_stub_llm() {
            vars.push((self.llm.api_key_env.as_str(), "OpenAI API Key"));
        }

        vars
    }

    /// Resolve every required variable through `lookup`, reporting all missing ones at once.
    ///
    /// Blank values count as missing.
    pub fn resolve_env<F>(&self, needs: Needs, lookup: F) -> Result<ResolvedEnv, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<MissingVar> = self
            .required_vars(needs)
            .into_iter()
            .filter(|&(name, _)| get(name).is_none())
            .map(|(name, description)| MissingVar {
                name: name.to_string(),
                description,
            })
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let secret = |name: &str| SecretString::new(get(name).unwrap_or_default().into());

        let openai_api_key = (needs.completion && !self.uses_stub_llm())
            .then(|| secret(&self.llm.api_key_env));

        // The bearer token only has to be present; posts are signed with the OAuth 1.0a keys
        let x = needs.publishing.then(|| {
            OAuth1Credentials::new(
                get(&self.x.api_key_env).unwrap_or_default(),
                secret(&self.x.api_secret_env),
                get(&self.x.access_token_env).unwrap_or_default(),
                secret(&self.x.access_token_secret_env),
            )
        });

        Ok(ResolvedEnv {
            system_prompt: get(&self.persona.system_prompt_env).unwrap_or_default(),
            model: get(&self.llm.model_env).unwrap_or_else(|| self.llm.default_model.clone()),
            openai_api_key,
            x,
        })
    }

    /// Resolve against the process environment
    pub fn resolve_process_env(&self, needs: Needs) -> Result<ResolvedEnv, ConfigError> {
        self.resolve_env(needs, |name| std::env::var(name).ok())
    }

    /// `x.max_chars` must fit the platform limit and leave room for the ellipsis
    pub fn check_max_chars(&self) -> Result<(), ConfigError> {
        let max_chars = self.x.max_chars;
        if !(MIN_OUTPUT_CHARS..=MAX_POST_CHARS).contains(&max_chars) {
            return Err(ConfigError::Invalid(format!(
                "x.max_chars must be between {} and {}, got {}",
                MIN_OUTPUT_CHARS, MAX_POST_CHARS, max_chars
            )));
        }
        Ok(())
    }

    pub fn check_schedule(&self) -> Result<(), ConfigError> {
        let schedule = &self.schedule;
        if schedule.interval_secs == 0 || schedule.poll_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "schedule.interval_secs and schedule.poll_secs must be greater than zero, got {} and {}",
                schedule.interval_secs, schedule.poll_secs
            )));
        }
        Ok(())
    }

    pub fn persona_config(&self, env: &ResolvedEnv) -> Result<PersonaConfig, ConfigError> {
        self.check_max_chars()?;

        Ok(PersonaConfig {
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_output_tokens,
            max_output_chars: self.x.max_chars,
            max_retries: self.llm.retries,
            backoff_base: Duration::from_secs(self.llm.backoff_base_secs),
            ..PersonaConfig::new(env.system_prompt.clone(), env.model.clone())
        })
    }

    pub fn schedule_config(&self) -> Result<ScheduleConfig, ConfigError> {
        self.check_schedule()?;

        Ok(ScheduleConfig {
            interval: Duration::from_secs(self.schedule.interval_secs),
            poll_interval: Duration::from_secs(self.schedule.poll_secs),
            error_backoff: Duration::from_secs(self.schedule.error_backoff_secs),
        })
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# persona-bot configuration
# Every key can be overridden with PERSONA_BOT__<SECTION>__<KEY>, e.g. PERSONA_BOT__LLM__PROVIDER=stub

[general]
log_level = "info"
# Log posts instead of publishing them
dry_run = false

[persona]
# Env var holding the persona / personality description
system_prompt_env = "SYSTEM_PROMPT"

[llm]
provider = "openai"  # openai, stub
api_key_env = "OPENAI_API_KEY"
# Env var that overrides default_model
model_env = "OPENAI_MODEL"
default_model = "gpt-3.5-turbo"
base_url = "https://api.openai.com/v1"
temperature = 0.8
max_output_tokens = 100
retries = 3
# Delay before retry n is backoff_base_secs * 2^n
backoff_base_secs = 1
timeout_secs = 45

[x]
bearer_token_env = "TWITTER_BEARER_TOKEN"
api_key_env = "TWITTER_API_KEY"
api_secret_env = "TWITTER_API_SECRET"
access_token_env = "TWITTER_ACCESS_TOKEN"
access_token_secret_env = "TWITTER_ACCESS_TOKEN_SECRET"
base_url = "https://api.twitter.com"
max_chars = 280

[schedule]
interval_secs = 3600
poll_secs = 60
# Pause after a cycle fails unexpectedly
error_backoff_secs = 300
"#
        .to_string()
    }
}
