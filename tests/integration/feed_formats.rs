//! Feed fetching and parsing through the pipeline's front door.

use crate::common::TestEnv;
use upcast::core::UpcastError;
use upcast::pipeline::UpdatePipeline;

#[tokio::test]
async fn manifest_feed_parses_through_local_source() {
    let env = TestEnv::new(
        "feed.toml",
        r#"
            base_url = "https://releases.example.com/"
            payload_size = 4096

            [[tasks]]
            kind = "file-replace"
            path = "bin/app"

            [[tasks]]
            kind = "run-command"
            program = "systemctl"
        "#,
    );

    let config = env.config("feed.toml", "manifest");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    assert_eq!(feed.base_url.as_deref(), Some("https://releases.example.com/"));
    assert_eq!(feed.payload_size, Some(4096));
    assert_eq!(feed.tasks.len(), 2);
}

#[tokio::test]
async fn appcast_feed_parses_through_local_source() {
    let env = TestEnv::new(
        "appcast.json",
        r#"{
            "base_url": "https://releases.example.com/",
            "items": [
                {"version": "1.1.0", "enclosure": {"url": "app.bin", "length": 10}}
            ]
        }"#,
    );

    let config = env.config("appcast.json", "appcast");
    let source = env.source(&config);
    let feed = UpdatePipeline::fetch_feed(&config, &source).await.unwrap();

    assert_eq!(feed.tasks.len(), 1);
    assert_eq!(feed.payload_size, Some(10));
}

#[tokio::test]
async fn malformed_feed_is_a_parse_error_with_no_partial_feed() {
    let env = TestEnv::new(
        "appcast.json",
        r#"{"items": [{"enclosure": {"url": "app.bin"}}]}"#,
    );

    let config = env.config("appcast.json", "appcast");
    let source = env.source(&config);
    let err = UpdatePipeline::fetch_feed(&config, &source).await.unwrap_err();

    let upcast_err = err.downcast_ref::<UpcastError>().unwrap();
    assert!(matches!(upcast_err, UpcastError::FeedParseError { .. }));
}

#[tokio::test]
async fn unknown_feed_format_is_rejected() {
    let env = TestEnv::new("feed.xml", "<rss/>");

    let config = env.config("feed.xml", "rss");
    let source = env.source(&config);
    let err = UpdatePipeline::fetch_feed(&config, &source).await.unwrap_err();

    let upcast_err = err.downcast_ref::<UpcastError>().unwrap();
    assert!(matches!(upcast_err, UpcastError::UnknownFeedFormat { .. }));
}
