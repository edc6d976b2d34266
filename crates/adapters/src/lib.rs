//! persona-bot adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `llm`: completion providers (OpenAI chat completions, stub)
//! - `x`: X (Twitter) API publisher and stub

pub mod llm;
pub mod x_api;

/// Re-exports for X API adapters
pub mod x {
    pub use crate::x_api::{OAuth1Credentials, StubXPublisher, XPublisher};
}
