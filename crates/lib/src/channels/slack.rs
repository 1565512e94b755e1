//! Slack channel: Events API payload types and the Web API client (auth.test, chat.postMessage).

use crate::channels::delivery::DeliveryGateway;
use crate::channels::inbound::{ChannelKind, EventKind, InboundEvent};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Events API envelope, discriminated by its outer `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookPayload {
    /// Endpoint handshake; the challenge is echoed back as received, whatever its JSON type.
    UrlVerification {
        #[serde(default)]
        challenge: serde_json::Value,
    },
    EventCallback {
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        event: Option<SlackEvent>,
    },
    #[serde(other)]
    Unknown,
}

/// Inner `event` object of an `event_callback`. Only the fields the relay reads.
#[derive(Debug, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}

impl SlackEvent {
    /// Normalize into an [`InboundEvent`].
    ///
    /// Workspace resolves `team`, then `team_id`, then the envelope's `team_id`. Subtyped
    /// messages (edits, deletions, joins) are not plain messages. An event is bot-originated
    /// when it carries a `bot_id` or its author is the bot itself.
    pub fn into_inbound(self, envelope_team_id: Option<String>, bot_user_id: Option<&str>) -> InboundEvent {
        let kind = if self.typ == "message" && self.subtype.is_none() {
            EventKind::Message
        } else {
            EventKind::Other
        };
        let author_id = self.user.unwrap_or_default();
        let is_self = matches!(bot_user_id, Some(id) if !id.is_empty() && id == author_id);
        let has_bot_id = self.bot_id.as_deref().is_some_and(|b| !b.is_empty());
        InboundEvent {
            kind,
            workspace_id: non_empty(self.team)
                .or_else(|| non_empty(self.team_id))
                .or_else(|| non_empty(envelope_team_id))
                .unwrap_or_default(),
            channel_id: self.channel.unwrap_or_default(),
            channel_kind: ChannelKind::from_slack(self.channel_type.as_deref()),
            author_id,
            is_bot_originated: has_bot_id || is_self,
            text: self.text.unwrap_or_default(),
            received_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack bot token not configured")]
    MissingToken,
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

/// Common `{ ok, error }` Web API response plus the fields we read.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// Slack Web API client.
#[derive(Clone)]
pub struct SlackClient {
    token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: Option<String>, api_base: Option<String>, timeout: Duration) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("slack: building http client with timeout failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            token,
            api_base,
            client,
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    async fn call(&self, method: &str, body: Option<serde_json::Value>) -> Result<ApiResponse, SlackError> {
        let token = self.token.as_ref().ok_or(SlackError::MissingToken)?;
        let url = format!("{}/{}", self.api_base, method);
        let mut req = self.client.post(&url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{} failed: {} {}", method, status, body)));
        }
        let data: ApiResponse = res.json().await?;
        if !data.ok {
            return Err(SlackError::Api(format!(
                "{}: {}",
                method,
                data.error.as_deref().unwrap_or("ok: false")
            )));
        }
        Ok(data)
    }

    /// auth.test — returns the bot's own user id.
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let data = self.call("auth.test", None).await?;
        data.user_id
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SlackError::Api("auth.test: response has no user_id".to_string()))
    }

    /// chat.postMessage with plain text.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let body = serde_json::json!({ "channel": channel, "text": text });
        self.call("chat.postMessage", Some(body)).await.map(|_| ())
    }
}

#[async_trait]
impl DeliveryGateway for SlackClient {
    async fn deliver(&self, channel_id: &str, text: &str) -> Result<(), String> {
        self.post_message(channel_id, text)
            .await
            .map_err(|e| e.to_string())
    }
}
