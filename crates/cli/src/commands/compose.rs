//! Compose command - generate one post without publishing

use anyhow::{Result, bail};
use persona_bot_domain::{ChatRole, SystemClock, usecases::PostComposer};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::args::ComposeArgs;
use crate::commands::build_completer;
use crate::config::{AppConfig, Needs};

#[derive(Debug, Serialize)]
struct ComposeOutput<'a> {
    post: &'a str,
    chars: usize,
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
}

pub async fn execute(args: ComposeArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let config = AppConfig::load(config_path.as_deref())?;
    let env = config.resolve_process_env(Needs {
        completion: true,
        publishing: false,
    })?;

    let completer = build_completer(&config, &env)?;
    let mut composer = PostComposer::new(
        completer,
        Arc::new(SystemClock),
        config.persona_config(&env)?,
    );

    let conversation = composer.build_prompt();
    let Some(post) = composer.generate().await else {
        bail!("Failed to generate post content");
    };

    if args.json {
        let output = ComposeOutput {
            post: &post,
            chars: post.chars().count(),
            model: &composer.persona().model,
            system: conversation.content_for(ChatRole::System).unwrap_or_default(),
            prompt: conversation.content_for(ChatRole::User).unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", post);
    }

    Ok(ExitCode::SUCCESS)
}
