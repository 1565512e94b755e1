//! Gateway HTTP server: Slack Events webhook, transcript read endpoint, health probe.

use crate::channels::SlackClient;
use crate::config::{self, Config, ReplySourceKind};
use crate::gateway::dispatch::{DispatchOutcome, Dispatcher};
use crate::llm::{EchoReply, GeminiClient, ReplySource};
use crate::policy::BotIdentity;
use crate::transcript::{TranscriptError, TranscriptStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub transcripts: Arc<TranscriptStore>,
    pub reply_source: ReplySourceKind,
}

impl GatewayState {
    /// Wire a dispatcher around the given store, identity and collaborators, using the
    /// reply timeout and fallback text from config.
    pub fn new(
        config: Config,
        transcripts: Arc<TranscriptStore>,
        identity: BotIdentity,
        source: Arc<dyn ReplySource>,
        delivery: Arc<dyn crate::channels::DeliveryGateway>,
    ) -> Self {
        let reply_source = source.kind();
        let dispatcher = Dispatcher::new(transcripts.clone(), identity, source, delivery)
            .with_timeout(config.reply.timeout())
            .with_fallback_text(config.reply.fallback_text.clone());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            transcripts,
            reply_source,
        }
    }
}

/// Pick the reply source from `reply.mode`. Generated mode without an API key falls back to
/// the static echo with a warning.
pub fn select_reply_source(config: &Config) -> Arc<dyn ReplySource> {
    match config.reply.mode {
        ReplySourceKind::Static => Arc::new(EchoReply),
        ReplySourceKind::Generated => match config::resolve_gemini_api_key(config) {
            Some(key) => {
                let gemini = &config.reply.gemini;
                let client = GeminiClient::new(
                    key,
                    Some(gemini.model.clone()),
                    Some(gemini.base_url.clone()),
                    config.reply.timeout(),
                );
                log::info!("reply source: gemini ({})", client.model());
                Arc::new(client)
            }
            None => {
                log::warn!(
                    "reply.mode is \"generated\" but no Gemini API key is configured (reply.gemini.apiKey or GEMINI_API_KEY); using static replies"
                );
                Arc::new(EchoReply)
            }
        },
    }
}

/// Resolve the bot's own user id once via auth.test. Failures leave the identity unknown,
/// which disables mention replies in channels but keeps direct messages working.
pub async fn resolve_bot_identity(slack: &SlackClient) -> BotIdentity {
    if !slack.has_token() {
        log::warn!("slack bot token not configured (channels.slack.botToken or SLACK_BOT_TOKEN); replies cannot be delivered");
        return BotIdentity::default();
    }
    match slack.auth_test().await {
        Ok(user_id) => {
            log::info!("slack bot user id: {}", user_id);
            BotIdentity::new(Some(user_id))
        }
        Err(e) => {
            log::warn!("slack auth.test failed, mention replies disabled: {}", e);
            BotIdentity::default()
        }
    }
}

/// Routes: `GET /` health, `POST <eventsPath>` webhook, `GET /api/messages` transcript.
pub fn router(state: GatewayState) -> Router {
    let events_path = state.config.channels.slack.events_path.clone();
    let events_path = if events_path.starts_with('/') {
        events_path
    } else {
        format!("/{}", events_path)
    };
    Router::new()
        .route("/", get(health_http))
        .route(&events_path, post(slack_events))
        .route("/api/messages", get(read_messages))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (Ctrl+C or SIGTERM).
/// `config_path` is used to resolve a relative transcripts directory.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let transcripts_dir = config::resolve_transcripts_dir(&config, &config_path);
    tokio::fs::create_dir_all(&transcripts_dir)
        .await
        .with_context(|| format!("creating transcripts directory {}", transcripts_dir.display()))?;
    log::info!("transcripts directory: {}", transcripts_dir.display());
    let transcripts = Arc::new(TranscriptStore::new(transcripts_dir));

    let slack = SlackClient::new(
        config::resolve_slack_token(&config),
        Some(config.channels.slack.api_base.clone()),
        config.reply.timeout(),
    );
    let identity = resolve_bot_identity(&slack).await;
    let source = select_reply_source(&config);

    let bind = config.gateway.bind.trim().to_string();
    let port = config.gateway.port;
    let state = GatewayState::new(config, transcripts, identity, source, Arc::new(slack));
    log::info!(
        "slack events at {} (reply source: {})",
        state.config.channels.slack.events_path,
        state.reply_source.as_str()
    );
    let app = router(state);

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// POST /slack/events — url_verification echo, event_callback dispatch, everything else 200.
async fn slack_events(State(state): State<GatewayState>, body: Bytes) -> Response {
    match state.dispatcher.dispatch(&body).await {
        DispatchOutcome::Verification { challenge } => {
            (StatusCode::OK, Json(json!({ "challenge": challenge }))).into_response()
        }
        DispatchOutcome::Malformed(reason) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
        }
        DispatchOutcome::Acknowledged
        | DispatchOutcome::Ignored
        | DispatchOutcome::Processed { .. } => StatusCode::OK.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    #[serde(rename = "workspaceID")]
    workspace_id: Option<String>,
    #[serde(rename = "channelID")]
    channel_id: Option<String>,
}

/// GET /api/messages?workspaceID=..&channelID=.. — raw transcript, newest first.
async fn read_messages(
    State(state): State<GatewayState>,
    Query(q): Query<MessagesQuery>,
) -> Response {
    let required = || {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "workspaceID and channelID are required" })),
        )
            .into_response()
    };
    let (Some(workspace_id), Some(channel_id)) = (q.workspace_id, q.channel_id) else {
        return required();
    };
    match state.transcripts.read(&workspace_id, &channel_id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(TranscriptError::MissingIdentifier) => required(),
        Err(e @ TranscriptError::InvalidIdentifier(_)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(TranscriptError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Messages file not found for the specified workspace and channel"
            })),
        )
            .into_response(),
        Err(e) => {
            log::warn!("transcript read failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read transcript" })),
            )
                .into_response()
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "replySource": state.reply_source.as_str(),
    }))
}
