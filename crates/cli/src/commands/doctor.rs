//! Doctor command - validate configuration and show status

use anyhow::Result;
use persona_bot_adapters::x::XPublisher;
use persona_bot_domain::Publisher;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::args::DoctorArgs;
use crate::config::{AppConfig, Needs};

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    persona: CheckResult,
    llm: CheckResult,
    x: CheckResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    x_verify: Option<CheckResult>,
    schedule: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        persona: CheckResult::error("Not checked"),
        llm: CheckResult::error("Not checked"),
        x: CheckResult::error("Not checked"),
        x_verify: None,
        schedule: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.persona = check_persona(config);
        report.llm = check_llm(config);
        report.x = check_x(config);
        report.schedule = check_schedule(config);

        if args.verify {
            report.x_verify = Some(verify_x(config).await);
        }
    }

    let mut checks = vec![
        &report.config,
        &report.persona,
        &report.llm,
        &report.x,
        &report.schedule,
    ];
    if let Some(ref verify) = report.x_verify {
        checks.push(verify);
    }

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn env_is_set(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.trim().is_empty())
}

fn check_persona(config: &AppConfig) -> CheckResult {
    let env_var = &config.persona.system_prompt_env;

    match std::env::var(env_var) {
        Ok(val) if !val.trim().is_empty() => {
            let first_line = val.lines().next().unwrap_or_default();
            CheckResult::ok(format!("{} (set): {}", env_var, first_line)).with_details(
                serde_json::json!({ "chars": val.chars().count() }),
            )
        }
        _ => CheckResult::error(format!("{} (not set)", env_var)),
    }
}

fn check_llm(config: &AppConfig) -> CheckResult {
    let provider = &config.llm.provider;
    let model = std::env::var(&config.llm.model_env)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| config.llm.default_model.clone());

    match provider.as_str() {
        "stub" => CheckResult::ok("Provider: stub (offline)"),
        "openai" => {
            let api_key_env = &config.llm.api_key_env;
            if env_is_set(api_key_env) {
                CheckResult::ok(format!(
                    "Provider: openai, Model: {}, API key: {} (set)",
                    model, api_key_env
                ))
            } else {
                CheckResult::error(format!(
                    "Provider: openai, Model: {}, API key: {} (not set)",
                    model, api_key_env
                ))
            }
        }
        other => CheckResult::error(format!("Unknown provider: {}", other)),
    }
}

fn check_x(config: &AppConfig) -> CheckResult {
    if let Err(e) = config.check_max_chars() {
        return CheckResult::error(e.to_string());
    }

    let required = config.required_vars(Needs {
        completion: false,
        publishing: true,
    });

    let missing: Vec<&str> = required
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| *name != config.persona.system_prompt_env && !env_is_set(name))
        .collect();

    if missing.is_empty() {
        return CheckResult::ok(format!("Credentials set, base_url: {}", config.x.base_url));
    }

    let message = format!("Missing: {}", missing.join(", "));
    let details = serde_json::json!({ "missing": missing });
    if config.general.dry_run {
        CheckResult::warn(format!("{} (dry run)", message)).with_details(details)
    } else {
        CheckResult::error(message).with_details(details)
    }
}

fn check_schedule(config: &AppConfig) -> CheckResult {
    if let Err(e) = config.check_schedule() {
        return CheckResult::error(e.to_string());
    }

    let schedule = &config.schedule;

    let message = format!(
        "Every {}s, polled every {}s, {}s backoff after errors",
        schedule.interval_secs, schedule.poll_secs, schedule.error_backoff_secs
    );

    if schedule.poll_secs > schedule.interval_secs {
        CheckResult::warn(format!("{} (poll is slower than interval)", message))
    } else {
        CheckResult::ok(message)
    }
}

async fn verify_x(config: &AppConfig) -> CheckResult {
    let env = match config.resolve_process_env(Needs {
        completion: false,
        publishing: true,
    }) {
        Ok(env) => env,
        Err(e) => return CheckResult::error(e.to_string()),
    };

    let Some(credentials) = env.x else {
        return CheckResult::error("X credentials were not resolved");
    };

    let publisher = XPublisher::with_base_url(
        credentials,
        config.x.base_url.clone(),
        config.x.max_chars,
    );

    if let Err(e) = publisher.connect().await {
        return CheckResult::error(format!("Connect failed: {}", e));
    }

    if publisher.verify_credentials().await {
        CheckResult::ok(format!(
            "Authenticated as @{}",
            publisher.username().unwrap_or("unknown")
        ))
    } else {
        CheckResult::error("Credential verification failed")
    }
}

fn print_report(report: &DoctorReport) {
    println!("persona-bot Doctor Report");
    println!("=========================");
    println!();

    print_check("Config", &report.config);
    print_check("Persona", &report.persona);
    print_check("LLM Provider", &report.llm);
    print_check("X", &report.x);
    if let Some(ref verify) = report.x_verify {
        print_check("X Verify", verify);
    }
    print_check("Schedule", &report.schedule);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: persona-bot run --dry-run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
