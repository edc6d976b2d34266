use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Command running in an empty directory with a clean environment
fn isolated_cmd(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("persona-bot");
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("persona-bot");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("interval_secs = 3600"));
    assert!(content.contains("system_prompt_env = \"SYSTEM_PROMPT\""));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine").expect("write config");

    let mut cmd = cargo_bin_cmd!("persona-bot");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");
}

#[test]
fn run_lists_every_missing_variable() {
    let dir = TempDir::new().expect("temp dir");

    isolated_cmd(&dir)
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required environment variables",
        ))
        .stderr(predicate::str::contains(
            "SYSTEM_PROMPT (Bot persona/personality description)",
        ))
        .stderr(predicate::str::contains("TWITTER_BEARER_TOKEN"))
        .stderr(predicate::str::contains("TWITTER_ACCESS_TOKEN_SECRET"))
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn dry_run_does_not_require_x_credentials() {
    let dir = TempDir::new().expect("temp dir");

    isolated_cmd(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .args(["run", "--once", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SYSTEM_PROMPT"))
        .stderr(predicate::str::contains("TWITTER_API_KEY").not());
}

#[test]
fn compose_with_stub_provider_prints_post() {
    let dir = TempDir::new().expect("temp dir");

    isolated_cmd(&dir)
        .env("PERSONA_BOT__LLM__PROVIDER", "stub")
        .env("SYSTEM_PROMPT", "Test bot")
        .arg("compose")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test bot (stub post #1)"));
}

#[test]
fn compose_outputs_valid_json() {
    let dir = TempDir::new().expect("temp dir");

    let output = isolated_cmd(&dir)
        .env("PERSONA_BOT__LLM__PROVIDER", "stub")
        .env("SYSTEM_PROMPT", "Test bot")
        .args(["compose", "--json"])
        .output()
        .expect("run compose");

    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["post"], "Test bot (stub post #1)");
    assert_eq!(value["model"], "gpt-3.5-turbo");
    let prompt = value["prompt"].as_str().expect("prompt");
    assert!(prompt.starts_with("Test bot\n\nCurrent time: "));
    assert!(prompt.contains("1. Fits your persona perfectly"));
    assert!(prompt.ends_with("Post:"));
}

#[test]
fn run_once_dry_run_publishes_to_stub() {
    let dir = TempDir::new().expect("temp dir");

    isolated_cmd(&dir)
        .env("PERSONA_BOT__LLM__PROVIDER", "stub")
        .env("SYSTEM_PROMPT", "Test bot")
        .args(["run", "--once", "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("[DRY RUN] Would publish"));
}

#[test]
fn config_file_values_are_used() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("config.toml"),
        "[general]\ndry_run = true\n\n[llm]\nprovider = \"stub\"\ndefault_model = \"my-model\"\n",
    )
    .expect("write config");

    let output = isolated_cmd(&dir)
        .env("SYSTEM_PROMPT", "Test bot")
        .args(["compose", "--json"])
        .output()
        .expect("run compose");

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["model"], "my-model");
}

#[test]
fn explicit_missing_config_file_fails() {
    let dir = TempDir::new().expect("temp dir");

    isolated_cmd(&dir)
        .args(["--config", "nope.toml", "compose"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn doctor_reports_missing_persona() {
    let dir = TempDir::new().expect("temp dir");

    let output = isolated_cmd(&dir)
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");

    assert!(!output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["overall"], "error");
    assert_eq!(value["persona"]["status"], "error");
    assert_eq!(value["config"]["status"], "ok");
}

#[test]
fn run_rejects_zero_schedule_and_oversized_posts() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("config.toml"),
        "[llm]\nprovider = \"stub\"\n\n[schedule]\ninterval_secs = 0\npoll_secs = 0\n",
    )
    .expect("write config");

    isolated_cmd(&dir)
        .env("SYSTEM_PROMPT", "Test bot")
        .args(["run", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than zero"));

    fs::write(
        dir.path().join("config.toml"),
        "[llm]\nprovider = \"stub\"\n\n[x]\nmax_chars = 1000\n",
    )
    .expect("write config");

    isolated_cmd(&dir)
        .env("SYSTEM_PROMPT", "Test bot")
        .args(["run", "--once", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("x.max_chars must be between 4 and 280"));
}
