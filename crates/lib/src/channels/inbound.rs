//! Inbound event from a channel, normalized from the platform's webhook payload.

use chrono::{DateTime, Utc};

/// Event type as far as the relay cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Other,
}

/// Where the message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    DirectMessage,
    MultiParty,
    Unknown,
}

impl ChannelKind {
    /// Map a Slack `channel_type` value.
    pub fn from_slack(channel_type: Option<&str>) -> Self {
        match channel_type {
            Some("im") => ChannelKind::DirectMessage,
            Some("channel") | Some("group") | Some("mpim") => ChannelKind::MultiParty,
            _ => ChannelKind::Unknown,
        }
    }
}

/// A message or other event delivered to the gateway for filtering, persistence and reply.
/// Identifiers are empty strings when the payload omitted them.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub workspace_id: String,
    pub channel_id: String,
    pub channel_kind: ChannelKind,
    pub author_id: String,
    pub is_bot_originated: bool,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Events without an author, or sent by a bot, never reach persistence or reply.
    pub fn is_from_bot_or_system(&self) -> bool {
        self.is_bot_originated || self.author_id.is_empty()
    }

    pub fn has_identifiers(&self) -> bool {
        !self.workspace_id.is_empty() && !self.channel_id.is_empty()
    }
}
