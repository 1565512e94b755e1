//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.scribe/config.json`) and environment.
//! Secrets (Slack bot token, Gemini API key) may come from either; env wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (Slack).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// How replies are produced (static echo or generated).
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Where transcripts are written.
    #[serde(default)]
    pub transcripts: TranscriptsConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub slack: SlackChannelConfig,
}

/// Slack channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackChannelConfig {
    /// Bot User OAuth token (xoxb-...). Overridden by SLACK_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Web API base URL (default https://slack.com/api). Tests point this at a local server.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Path Slack POSTs Events API payloads to.
    #[serde(default = "default_slack_events_path")]
    pub events_path: String,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_slack_events_path() -> String {
    "/slack/events".to_string()
}

impl Default for SlackChannelConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_slack_api_base(),
            events_path: default_slack_events_path(),
        }
    }
}

/// Where reply text comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySourceKind {
    /// Fixed echo of the inbound text.
    #[default]
    Static,
    /// Text-generation service (Gemini).
    Generated,
}

impl ReplySourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplySourceKind::Static => "static",
            ReplySourceKind::Generated => "generated",
        }
    }
}

/// Reply settings: source, outbound timeout, fallback text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyConfig {
    #[serde(default)]
    pub mode: ReplySourceKind,

    /// Upper bound for each outbound call (generation and delivery), in seconds.
    #[serde(default = "default_reply_timeout_secs")]
    pub timeout_secs: u64,

    /// Sent instead of a generated reply when generation fails or times out.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_reply_timeout_secs() -> u64 {
    10
}

fn default_fallback_text() -> String {
    "Sorry, I couldn't come up with a reply right now.".to_string()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            mode: ReplySourceKind::default(),
            timeout_secs: default_reply_timeout_secs(),
            fallback_text: default_fallback_text(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl ReplyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Gemini generateContent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env when set.
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

/// Transcript storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptsConfig {
    /// Root directory for transcripts. Relative paths resolve against the config file's parent.
    /// Default: `transcripts` next to the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn env_or_config(var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_token(config: &Config) -> Option<String> {
    env_or_config("SLACK_BOT_TOKEN", config.channels.slack.bot_token.as_ref())
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    env_or_config("GEMINI_API_KEY", config.reply.gemini.api_key.as_ref())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SCRIBE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".scribe").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the transcript root: `transcripts.directory` if set (relative paths resolved against the
/// config file's parent), otherwise the `transcripts` subdirectory next to the config file.
pub fn resolve_transcripts_dir(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.transcripts.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                parent.join(d)
            }
        }
        _ => parent.join("transcripts"),
    }
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
