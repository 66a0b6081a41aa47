//! End-to-end pipeline runs against temp-dir installations.

use crate::common::{TestEnv, sha256_of};
use upcast::pipeline::{PendingState, RunOutcome, UpdatePipeline};
use upcast::task::ExecutionStatus;

#[tokio::test]
async fn all_tasks_succeed_in_feed_order() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            path = "bin/app"
            url = "app-2.bin"
            hot_swap = true

            [[tasks]]
            kind = "config-value"
            file = "settings.toml"
            key = "core.channel"
            value = "stable"
        "#,
    );
    env.add_payload("app-2.bin", b"version two");
    env.add_installed("bin/app", b"version one");
    env.add_installed("settings.toml", b"[core]\nchannel = \"beta\"\n");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(report.is_success(), "unexpected outcome: {:?}", report.outcome);
    assert!(!report.pending_restart);
    assert_eq!(report.tasks.len(), 2);
    assert!(report.tasks.iter().all(|t| t.status == ExecutionStatus::Successful));

    assert_eq!(env.installed("bin/app").unwrap(), b"version two");
    let settings = String::from_utf8(env.installed("settings.toml").unwrap()).unwrap();
    assert!(settings.contains("channel = \"stable\""));
}

#[tokio::test]
async fn appcast_run_verifies_checksums_and_replaces() {
    let env = TestEnv::new("appcast.json", "placeholder");
    env.add_payload("app-2.1.0.bin", b"the new binary");
    env.add_installed("bin/app", b"the old binary");

    let checksum = sha256_of(&env.root().join("app-2.1.0.bin")).await;
    let feed_doc = format!(
        r#"{{
            "items": [{{
                "description": "App 2.1.0",
                "version": "2.1.0",
                "path": "bin/app",
                "hot_swap": true,
                "enclosure": {{"url": "app-2.1.0.bin", "sha256": "{checksum}"}}
            }}]
        }}"#
    );
    std::fs::write(env.root().join("appcast.json"), feed_doc).unwrap();

    let mut config = env.config("appcast.json", "appcast");
    config.installed_version = Some("2.0.0".to_string());
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(report.is_success(), "unexpected outcome: {:?}", report.outcome);
    assert_eq!(env.installed("bin/app").unwrap(), b"the new binary");
}

#[tokio::test]
async fn current_installation_skips_version_gated_tasks() {
    let env = TestEnv::new(
        "appcast.json",
        r#"{
            "items": [{
                "version": "1.2.0",
                "path": "bin/app",
                "enclosure": {"url": "app.bin"}
            }]
        }"#,
    );
    env.add_payload("app.bin", b"payload");

    // Installed version equals the feed version: the item must not apply
    let mut config = env.config("appcast.json", "appcast");
    config.installed_version = Some("1.2.0".to_string());
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(report.is_success());
    assert_eq!(report.tasks.len(), 1);
    assert!(report.tasks[0].skipped);
    assert_ne!(report.tasks[0].status, ExecutionStatus::Successful);
    assert!(env.installed("bin/app").is_none());
}

#[tokio::test]
async fn rerunning_an_identical_feed_is_idempotent() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            path = "bin/app"
            url = "app.bin"
            hot_swap = true

            [[tasks]]
            kind = "config-value"
            file = "settings.toml"
            key = "ui.theme"
            value = "dark"
        "#,
    );
    env.add_payload("app.bin", b"target state");
    env.add_installed("bin/app", b"initial state");

    for _ in 0..2 {
        let config = env.config("feed.toml", "manifest");
        let source = env.source(&config);
        let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
        let report = UpdatePipeline::new(config, source, feed).run().await;
        assert!(report.is_success(), "unexpected outcome: {:?}", report.outcome);
    }

    assert_eq!(env.installed("bin/app").unwrap(), b"target state");
    let settings = String::from_utf8(env.installed("settings.toml").unwrap()).unwrap();
    assert!(settings.contains("theme = \"dark\""));
}

#[tokio::test]
async fn cold_update_defers_and_resume_applies() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "file-replace"
            path = "bin/app"
            url = "app.bin"
        "#,
    );
    env.add_payload("app.bin", b"deferred contents");
    env.add_installed("bin/app", b"live contents");

    // First run: the default (cold) file task defers its swap
    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    assert!(report.is_success());
    assert!(report.pending_restart);
    assert_eq!(report.tasks[0].status, ExecutionStatus::RequiresRestart);
    assert_eq!(env.installed("bin/app").unwrap(), b"live contents");

    // "Next process start": resume from the pending state file
    let config = env.config("feed.toml", "manifest");
    let state = PendingState::load(&config.pending_state_path())
        .await
        .unwrap()
        .expect("pending state written");
    let (base_url, tasks) = state.into_tasks();
    let feed = upcast::feed::Feed {
        base_url,
        payload_size: None,
        compressed_size: None,
        tasks,
    };
    let source = env.source(&config);
    let report =
        UpdatePipeline::new(config, source, feed).with_cold_run(true).run().await;

    assert!(report.is_success(), "unexpected outcome: {:?}", report.outcome);
    assert!(!report.pending_restart);
    assert_eq!(env.installed("bin/app").unwrap(), b"deferred contents");

    // The work list is consumed
    let config = env.config("feed.toml", "manifest");
    assert!(PendingState::load(&config.pending_state_path()).await.unwrap().is_none());
}

#[tokio::test]
async fn cancellation_before_execution_rolls_back_nothing() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            file = "settings.toml"
            key = "a.b"
            value = 1
        "#,
    );
    env.add_installed("settings.toml", b"");

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    let pipeline = UpdatePipeline::new(config, source, feed);
    pipeline.cancel_token().cancel();
    let report = pipeline.run().await;

    match &report.outcome {
        RunOutcome::RolledBack {
            failure,
        } => {
            assert!(failure.cancelled);
        }
        other => panic!("expected cancelled rollback outcome, got {other:?}"),
    }
    assert!(report.rollback_failures.is_empty());
    assert!(report.tasks.iter().all(|t| t.status != ExecutionStatus::Successful));
}

#[tokio::test]
async fn missing_payload_aborts_during_preparation() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            [[tasks]]
            kind = "config-value"
            file = "settings.toml"
            key = "will.never"
            value = "happen"

            [[tasks]]
            kind = "file-replace"
            path = "bin/app"
            url = "not-on-disk.bin"
        "#,
    );

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();
    let report = UpdatePipeline::new(config, source, feed).run().await;

    match &report.outcome {
        RunOutcome::PreparationFailed {
            task,
            ..
        } => {
            assert_eq!(task.as_deref(), Some("Replace bin/app"));
        }
        other => panic!("expected preparation failure, got {other:?}"),
    }

    // Fail-fast before any destructive step: the first task never ran
    assert!(env.installed("settings.toml").is_none());
    assert!(report.tasks.iter().all(|t| t.status != ExecutionStatus::Successful));
}
