//! CLI-level tests against the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::TestEnv;

fn write_cli_config(env: &TestEnv, feed_file: &str, feed_format: &str) -> std::path::PathBuf {
    let config_path = env.root().join("upcast.toml");
    let contents = format!(
        "feed_url = \"{feed_file}\"\nfeed_format = \"{feed_format}\"\napp_dir = \"install\"\nstaging_dir = \"staging\"\n"
    );
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("upcast")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn check_reports_applicable_tasks() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            description = "flip the channel"
            file = "settings.toml"
            key = "core.channel"
            value = "stable"
        "#,
    );
    let config_path = write_cli_config(&env, "feed.toml", "manifest");

    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--no-progress", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 task(s) in feed, 1 applicable"))
        .stdout(predicate::str::contains("flip the channel"));
}

#[test]
fn apply_runs_the_pipeline_end_to_end() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            path = "bin/app"
            url = "app.bin"
            hot_swap = true
        "#,
    );
    env.add_payload("app.bin", b"updated");
    env.add_installed("bin/app", b"outdated");
    let config_path = write_cli_config(&env, "feed.toml", "manifest");

    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--no-progress", "apply"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update applied successfully"));

    assert_eq!(env.installed("bin/app").unwrap(), b"updated");
}

#[test]
fn apply_failure_exits_nonzero_and_names_the_task() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            description = "unreachable payload"
            path = "bin/app"
            url = "missing.bin"
        "#,
    );
    let config_path = write_cli_config(&env, "feed.toml", "manifest");

    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--no-progress", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreachable payload"));
}

#[test]
fn missing_config_file_is_a_clean_error() {
    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", "/nonexistent/upcast.toml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn resume_without_pending_state_explains_itself() {
    let env = TestEnv::new("feed.toml", "");
    let config_path = write_cli_config(&env, "feed.toml", "manifest");

    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--no-progress", "resume"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to resume"));
}

#[test]
fn apply_json_report_is_machine_readable() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            file = "settings.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    let config_path = write_cli_config(&env, "feed.toml", "manifest");

    Command::cargo_bin("upcast")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--no-progress", "apply", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"result\": \"success\""));
}
