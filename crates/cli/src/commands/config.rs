//! Config command - configuration management

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<ExitCode> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(path, force),
    }
}

fn init_config(path: PathBuf, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    fs::write(&path, AppConfig::example_toml())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set SYSTEM_PROMPT, OPENAI_API_KEY and the TWITTER_* variables (or a .env file)");
    println!("  2. Run 'persona-bot doctor' to validate your setup");
    println!("  3. Run 'persona-bot compose' to preview a post");
    println!("  4. Run 'persona-bot run --dry-run --once' to test a full cycle");

    Ok(ExitCode::SUCCESS)
}
