//! Rollback protocol: reverse order, exact-once, degraded reporting.

use crate::common::TestEnv;
use upcast::pipeline::{RunOutcome, UpdatePipeline};
use upcast::task::ExecutionStatus;

/// Feed where the middle task fails at execute: the settings document
/// carries a scalar where the task needs a table, which only surfaces
/// when the edit is attempted.
const A_FAILS_B_FEED: &str = r#"
    [[tasks]]
    kind = "config-value"
    description = "task A"
    file = "a.toml"
    key = "state.value"
    value = "applied"

    [[tasks]]
    kind = "config-value"
    description = "task B"
    file = "broken.toml"
    key = "ui.theme"
    value = "dark"

    [[tasks]]
    kind = "config-value"
    description = "task C"
    file = "c.toml"
    key = "state.value"
    value = "never"
"#;

#[tokio::test]
async fn failure_rolls_back_prior_tasks_and_halts() {
    let env = TestEnv::new("feed.toml", A_FAILS_B_FEED);
    env.add_installed("a.toml", b"[state]\nvalue = \"original\"\n");
    // 'ui' is a scalar, so task B cannot navigate into it
    env.add_installed("broken.toml", b"ui = \"compact\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    // Failed during execution, fully rolled back, naming task B
    match &report.outcome {
        RunOutcome::RolledBack {
            failure,
        } => {
            assert!(!failure.cancelled);
            assert_eq!(failure.task.as_deref(), Some("task B"));
        }
        other => panic!("expected rolled-back outcome, got {other:?}"),
    }
    assert!(report.rollback_failures.is_empty());

    // A executed and was reversed; its file is back to the original
    let a = String::from_utf8(env.installed("a.toml").unwrap()).unwrap();
    assert!(a.contains("value = \"original\""));

    // C was never attempted
    assert_eq!(report.tasks[2].description, "task C");
    assert_eq!(report.tasks[2].status, ExecutionStatus::Prepared);
    assert!(env.installed("c.toml").is_none());

    // B is the failure
    assert_eq!(report.tasks[1].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn rollback_unwinds_in_reverse_order() {
    // Two tasks mutate the same key in sequence; only a last-first
    // unwind restores the original value.
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            description = "first write"
            file = "settings.toml"
            key = "state.value"
            value = "one"

            [[tasks]]
            kind = "config-value"
            description = "second write"
            file = "settings.toml"
            key = "state.value"
            value = "two"

            [[tasks]]
            kind = "config-value"
            description = "failing write"
            file = "broken.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    env.add_installed("settings.toml", b"[state]\nvalue = \"zero\"\n");
    env.add_installed("broken.toml", b"ui = \"compact\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(matches!(report.outcome, RunOutcome::RolledBack { .. }));

    // Forward: zero → one → two. Reverse unwind: second restores "one",
    // then first restores "zero". Any other order leaves "one" behind.
    let settings = String::from_utf8(env.installed("settings.toml").unwrap()).unwrap();
    assert!(settings.contains("value = \"zero\""), "got: {settings}");
}

#[tokio::test]
async fn rollback_restores_absent_keys_to_absence() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            description = "introduce key"
            file = "settings.toml"
            key = "fresh.key"
            value = "present"

            [[tasks]]
            kind = "config-value"
            description = "failing write"
            file = "broken.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    env.add_installed("settings.toml", b"[other]\nkeep = true\n");
    env.add_installed("broken.toml", b"ui = \"compact\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(matches!(report.outcome, RunOutcome::RolledBack { .. }));

    // The introduced key is absent again - not present-with-empty-value
    let settings = String::from_utf8(env.installed("settings.toml").unwrap()).unwrap();
    assert!(!settings.contains("fresh"), "got: {settings}");
    assert!(settings.contains("keep = true"));
}

#[tokio::test]
async fn file_replacements_roll_back_to_prior_contents() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            description = "swap binary"
            path = "bin/app"
            url = "app.bin"
            hot_swap = true

            [[tasks]]
            kind = "config-value"
            description = "failing write"
            file = "broken.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    env.add_payload("app.bin", b"new binary");
    env.add_installed("bin/app", b"old binary");
    env.add_installed("broken.toml", b"ui = \"compact\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(matches!(report.outcome, RunOutcome::RolledBack { .. }));
    assert_eq!(env.installed("bin/app").unwrap(), b"old binary");
}

#[cfg(unix)]
#[tokio::test]
async fn rollback_failures_are_reported_but_do_not_stop_the_unwind() {
    // The failing undo command makes the first task's reversal fail;
    // the file task after it must still be rolled back.
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "run-command"
            description = "irreversible step"
            program = "true"
            undo_program = "false"

            [[tasks]]
            kind = "file-replace"
            description = "swap binary"
            path = "bin/app"
            url = "app.bin"
            hot_swap = true

            [[tasks]]
            kind = "config-value"
            description = "failing write"
            file = "broken.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    env.add_payload("app.bin", b"new binary");
    env.add_installed("bin/app", b"old binary");
    env.add_installed("broken.toml", b"ui = \"compact\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    match &report.outcome {
        RunOutcome::RollbackIncomplete {
            failure,
        } => {
            assert_eq!(failure.task.as_deref(), Some("failing write"));
        }
        other => panic!("expected rollback-incomplete outcome, got {other:?}"),
    }

    // The undo failure is attributed to the right task...
    assert_eq!(report.rollback_failures.len(), 1);
    assert_eq!(report.rollback_failures[0].task, "irreversible step");

    // ...and the file replacement after it in the stack was still reversed
    assert_eq!(env.installed("bin/app").unwrap(), b"old binary");
}
