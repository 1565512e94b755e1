//! Integration test: start the gateway on a free port and drive it over HTTP.
//! Does not require Slack or Gemini; the Slack API base points at a closed local port,
//! so every delivery fails. The server task is left running when the test ends.

use lib::config::Config;
use lib::gateway;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_config_dir() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("scribe-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create config dir");
    let config_path = dir.join("config.json");
    std::fs::File::create(&config_path)
        .and_then(|mut f| f.write_all(b"{}"))
        .expect("write config.json");
    (dir, config_path)
}

/// Start a gateway and wait until `GET /` answers. Returns the base URL and transcript root.
async fn start_gateway() -> (String, PathBuf) {
    let port = free_port();
    let (dir, config_path) = temp_config_dir();
    let transcripts = dir.join("transcripts");

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.channels.slack.api_base = format!("http://127.0.0.1:{}", free_port());
    config.transcripts.directory = Some(transcripts.clone());
    config.reply.timeout_secs = 2;

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config, config_path).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/", base)).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                assert_eq!(json.get("replySource").and_then(|v| v.as_str()), Some("static"));
                return (base, transcripts);
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {}/ did not return 200 with health JSON within 5s; last error: {:?}",
        base, last_err
    );
}

async fn post_event(base: &str, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/slack/events", base))
        .json(&body)
        .send()
        .await
        .expect("POST /slack/events")
}

async fn get_messages(base: &str, query: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/api/messages{}", base, query))
        .send()
        .await
        .expect("GET /api/messages")
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let (base, transcripts) = start_gateway().await;
    let resp = post_event(
        &base,
        serde_json::json!({ "type": "url_verification", "challenge": "abc123" }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(json, serde_json::json!({ "challenge": "abc123" }));
    assert_eq!(std::fs::read_dir(&transcripts).expect("read dir").count(), 0);
}

#[tokio::test]
async fn url_verification_echoes_numeric_challenge() {
    let (base, _) = start_gateway().await;
    let resp = post_event(
        &base,
        serde_json::json!({ "type": "url_verification", "challenge": 12345 }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(json, serde_json::json!({ "challenge": 12345 }));
}

#[tokio::test]
async fn transcript_without_activity_is_404() {
    let (base, _) = start_gateway().await;
    let resp = get_messages(&base, "?workspaceID=T1&channelID=C1").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn transcript_requires_both_parameters() {
    let (base, _) = start_gateway().await;
    assert_eq!(get_messages(&base, "?workspaceID=T1").await.status(), 400);
    assert_eq!(get_messages(&base, "?channelID=C1").await.status(), 400);
    assert_eq!(get_messages(&base, "?workspaceID=&channelID=C1").await.status(), 400);
    assert_eq!(get_messages(&base, "?workspaceID=..&channelID=C1").await.status(), 400);
}

#[tokio::test]
async fn bot_message_is_acknowledged_and_not_recorded() {
    let (base, _) = start_gateway().await;
    let resp = post_event(
        &base,
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message", "text": "hi", "user": "U1", "bot_id": "B1",
                "channel": "D1", "team": "T1", "channel_type": "im"
            }
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(get_messages(&base, "?workspaceID=T1&channelID=D1").await.status(), 404);
}

#[tokio::test]
async fn direct_message_is_recorded_even_when_delivery_fails() {
    let (base, transcripts) = start_gateway().await;
    let resp = post_event(
        &base,
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message", "text": "hi", "user": "U1",
                "channel": "D1", "team": "T1", "channel_type": "im"
            }
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    assert!(transcripts.join("T1").join("D1").join("messages.txt").is_file());
    let resp = get_messages(&base, "?workspaceID=T1&channelID=D1").await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("body");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 1, "unexpected transcript: {}", body);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("] User: U1, Message: \"hi\""));
}

#[tokio::test]
async fn qualifying_message_without_team_is_400() {
    let (base, _) = start_gateway().await;
    let resp = post_event(
        &base,
        serde_json::json!({
            "type": "event_callback",
            "event": { "type": "message", "text": "hi", "user": "U1", "channel": "D1", "channel_type": "im" }
        }),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_payloads_are_acknowledged() {
    let (base, _) = start_gateway().await;
    let resp = post_event(&base, serde_json::json!({ "type": "app_rate_limited" })).await;
    assert_eq!(resp.status(), 200);
    let resp = reqwest::Client::new()
        .post(format!("{}/slack/events", base))
        .body("not json")
        .send()
        .await
        .expect("POST /slack/events");
    assert_eq!(resp.status(), 200);
}
