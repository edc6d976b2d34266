//! Run command - post once now, then on a fixed cadence until a shutdown signal

use anyhow::Result;
use persona_bot_domain::{
    Clock, CompletionService, Publisher, SystemClock,
    usecases::{CadenceScheduler, PersonaBot, PostComposer},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::args::RunArgs;
use crate::commands::{build_completer, build_publisher};
use crate::config::{AppConfig, Needs};
use crate::shutdown;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let config = AppConfig::load(config_path.as_deref())?;
    let schedule = config.schedule_config()?;
    let dry_run = args.dry_run || config.general.dry_run;

    let env = config.resolve_process_env(Needs {
        completion: true,
        publishing: !dry_run,
    })?;
    let persona = config.persona_config(&env)?;

    tracing::info!(
        dry_run = dry_run,
        once = args.once,
        provider = %config.llm.provider,
        interval_secs = config.schedule.interval_secs,
        "Starting persona-bot run"
    );

    let completer = build_completer(&config, &env)?;
    let publisher = build_publisher(&config, &env, dry_run)?;
    let composer = PostComposer::new(completer, Arc::new(SystemClock), persona);
    let mut bot = PersonaBot::new(composer, publisher);

    let shutdown = CancellationToken::new();
    shutdown::install(shutdown.clone());

    if args.once {
        return run_once(&mut bot, &shutdown).await;
    }

    let scheduler = CadenceScheduler::new(schedule);
    bot.run(&scheduler, &shutdown).await?;

    tracing::info!("persona-bot run completed");
    Ok(ExitCode::SUCCESS)
}

/// Single cycle. A shutdown requested while it runs lets it finish and exits cleanly.
async fn run_once<C, P, Cl>(
    bot: &mut PersonaBot<C, P, Cl>,
    shutdown: &CancellationToken,
) -> Result<ExitCode>
where
    C: CompletionService + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    bot.initialize().await?;
    let published = bot.run_cycle().await;
    bot.stop();

    if shutdown.is_cancelled() {
        tracing::info!(published, "Shutdown requested during cycle");
        return Ok(ExitCode::SUCCESS);
    }

    Ok(if published {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
