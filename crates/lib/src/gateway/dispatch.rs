//! Event dispatcher: one webhook body in, one outcome out.
//!
//! Classifies the envelope, drops bot/system noise, records the inbound line, asks the
//! reply policy, composes and delivers a reply, and records the outbound line when
//! delivery succeeded. Holds no per-conversation state between calls.

use crate::channels::{DeliveryGateway, EventKind, InboundEvent, WebhookPayload};
use crate::llm::ReplySource;
use crate::policy::{BotIdentity, ReplyPolicy};
use crate::transcript::{TranscriptEntry, TranscriptStore};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_FALLBACK_TEXT: &str = "Sorry, I couldn't come up with a reply right now.";

/// What the webhook caller should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `url_verification` handshake: echo the challenge unchanged (`null` when absent).
    Verification { challenge: serde_json::Value },
    /// Unknown or unparsable envelope; nothing done.
    Acknowledged,
    /// Bot/system-originated, non-message or empty event; nothing persisted.
    Ignored,
    /// Qualifying message missing workspace or channel.
    Malformed(String),
    /// Inbound line recorded; `replied` is true when a reply was delivered.
    Processed { replied: bool },
}

pub struct Dispatcher {
    store: Arc<TranscriptStore>,
    identity: BotIdentity,
    policy: ReplyPolicy,
    source: Arc<dyn ReplySource>,
    delivery: Arc<dyn DeliveryGateway>,
    timeout: Duration,
    fallback_text: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<TranscriptStore>,
        identity: BotIdentity,
        source: Arc<dyn ReplySource>,
        delivery: Arc<dyn DeliveryGateway>,
    ) -> Self {
        let policy = ReplyPolicy::new(&identity, source.kind());
        Self {
            store,
            identity,
            policy,
            source,
            delivery,
            timeout: DEFAULT_TIMEOUT,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }

    /// Bound for each outbound call; a timeout counts as a failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Text sent when the reply source fails.
    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }

    pub fn store(&self) -> &Arc<TranscriptStore> {
        &self.store
    }

    /// Handle one raw webhook body.
    pub async fn dispatch(&self, body: &[u8]) -> DispatchOutcome {
        let payload: WebhookPayload = match serde_json::from_slice(body) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("webhook: unrecognized payload ({}), acknowledging", e);
                return DispatchOutcome::Acknowledged;
            }
        };
        match payload {
            WebhookPayload::UrlVerification { challenge } => {
                log::info!("webhook: url_verification handshake");
                DispatchOutcome::Verification { challenge }
            }
            WebhookPayload::EventCallback {
                team_id,
                event: Some(event),
            } => {
                let event = event.into_inbound(team_id, self.identity.user_id.as_deref());
                self.handle_event(event).await
            }
            WebhookPayload::EventCallback { event: None, .. } => {
                log::debug!("webhook: event_callback without event, acknowledging");
                DispatchOutcome::Acknowledged
            }
            WebhookPayload::Unknown => DispatchOutcome::Acknowledged,
        }
    }

    /// Filter, persist and reply to a normalized event.
    pub async fn handle_event(&self, event: InboundEvent) -> DispatchOutcome {
        if event.is_from_bot_or_system() {
            log::debug!("webhook: ignoring bot/system event in {}", event.channel_id);
            return DispatchOutcome::Ignored;
        }
        if event.kind != EventKind::Message || event.text.is_empty() {
            return DispatchOutcome::Ignored;
        }
        if !event.has_identifiers() {
            log::warn!(
                "webhook: message from {} missing team or channel (team={:?}, channel={:?})",
                event.author_id,
                event.workspace_id,
                event.channel_id
            );
            return DispatchOutcome::Malformed("team and channel are required".to_string());
        }

        let inbound = TranscriptEntry::inbound(&event.author_id, &event.text, event.received_at);
        self.record(&event, inbound).await;

        let decision = self.policy.decide(&event);
        if !decision.should_reply {
            return DispatchOutcome::Processed { replied: false };
        }
        log::debug!(
            "webhook: replying in {}/{} via {} source",
            event.workspace_id,
            event.channel_id,
            decision.reply_source.as_str()
        );

        let reply = self.compose(&decision.prompt_text).await;
        let delivered = match tokio::time::timeout(
            self.timeout,
            self.delivery.deliver(&event.channel_id, &reply),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                log::warn!("webhook: delivery to {} failed: {}", event.channel_id, reason);
                false
            }
            Err(_) => {
                log::warn!(
                    "webhook: delivery to {} timed out after {:?}",
                    event.channel_id,
                    self.timeout
                );
                false
            }
        };
        if delivered {
            self.record(&event, TranscriptEntry::outbound(&reply)).await;
        }
        DispatchOutcome::Processed { replied: delivered }
    }

    async fn compose(&self, prompt: &str) -> String {
        match tokio::time::timeout(self.timeout, self.source.compose(prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("webhook: reply generation failed: {}", e);
                self.fallback_text.clone()
            }
            Err(_) => {
                log::warn!("webhook: reply generation timed out after {:?}", self.timeout);
                self.fallback_text.clone()
            }
        }
    }

    async fn record(&self, event: &InboundEvent, entry: TranscriptEntry) {
        match self
            .store
            .append(&event.workspace_id, &event.channel_id, &entry)
            .await
        {
            Ok(path) => log::debug!("transcript: {:?} line saved to {}", entry.direction, path.display()),
            Err(e) => log::warn!(
                "transcript: failed to save {:?} line for {}/{}: {}",
                entry.direction,
                event.workspace_id,
                event.channel_id,
                e
            ),
        }
    }
}
