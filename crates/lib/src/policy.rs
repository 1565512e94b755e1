//! Reply policy: decides whether an inbound event gets a reply.
//!
//! Pure function of the event, the bot identity and the configured reply source.

use crate::channels::{ChannelKind, EventKind, InboundEvent};
use crate::config::ReplySourceKind;

/// The bot's own platform identity, fetched once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: Option<String>,
}

impl BotIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|u| !u.is_empty()),
        }
    }

    /// True when `text` mentions this bot, either as `<@U123>` or labelled as `<@U123|name>`.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let Some(id) = self.user_id.as_deref() else {
            return false;
        };
        text.match_indices("<@").any(|(i, _)| {
            let rest = &text[i + 2..];
            rest.strip_prefix(id)
                .is_some_and(|after| after.starts_with('>') || after.starts_with('|'))
        })
    }
}

/// Outcome of [`ReplyPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDecision {
    pub should_reply: bool,
    pub reply_source: ReplySourceKind,
    /// Prompt for the reply source; empty when `should_reply` is false.
    pub prompt_text: String,
}

#[derive(Debug, Clone)]
pub struct ReplyPolicy {
    identity: BotIdentity,
    source: ReplySourceKind,
}

impl ReplyPolicy {
    pub fn new(identity: &BotIdentity, source: ReplySourceKind) -> Self {
        Self {
            identity: identity.clone(),
            source,
        }
    }

    /// Direct messages always get a reply; multi-party channels only when the bot is mentioned.
    pub fn decide(&self, event: &InboundEvent) -> ReplyDecision {
        if event.kind != EventKind::Message || event.text.is_empty() {
            return self.no_reply();
        }
        let addressed = match event.channel_kind {
            ChannelKind::DirectMessage => true,
            ChannelKind::MultiParty => self.identity.is_mentioned_in(&event.text),
            ChannelKind::Unknown => false,
        };
        if !addressed {
            return self.no_reply();
        }
        ReplyDecision {
            should_reply: true,
            reply_source: self.source,
            prompt_text: event.text.clone(),
        }
    }

    fn no_reply(&self) -> ReplyDecision {
        ReplyDecision {
            should_reply: false,
            reply_source: self.source,
            prompt_text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, channel_kind: ChannelKind, text: &str) -> InboundEvent {
        InboundEvent {
            kind,
            workspace_id: "T1".into(),
            channel_id: "C1".into(),
            channel_kind,
            author_id: "U1".into(),
            is_bot_originated: false,
            text: text.into(),
            received_at: chrono::Utc::now(),
        }
    }

    fn policy() -> ReplyPolicy {
        ReplyPolicy::new(&BotIdentity::new(Some("UBOT".into())), ReplySourceKind::Generated)
    }

    #[test]
    fn direct_message_with_text_replies() {
        let d = policy().decide(&event(EventKind::Message, ChannelKind::DirectMessage, "hi"));
        assert!(d.should_reply);
        assert_eq!(d.reply_source, ReplySourceKind::Generated);
        assert_eq!(d.prompt_text, "hi");
    }

    #[test]
    fn empty_text_never_replies() {
        let d = policy().decide(&event(EventKind::Message, ChannelKind::DirectMessage, ""));
        assert!(!d.should_reply);
    }

    #[test]
    fn non_message_never_replies() {
        let d = policy().decide(&event(EventKind::Other, ChannelKind::DirectMessage, "hi"));
        assert!(!d.should_reply);
    }

    #[test]
    fn channel_replies_only_when_mentioned() {
        let p = policy();
        assert!(p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "hey <@UBOT> help"))
            .should_reply);
        assert!(!p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "hey everyone"))
            .should_reply);
        assert!(!p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "hey <@UOTHER>"))
            .should_reply);
    }

    #[test]
    fn labelled_mention_counts() {
        let p = policy();
        assert!(p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "<@UBOT|scribe> hi"))
            .should_reply);
        assert!(!p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "<@UBOTX> hi"))
            .should_reply);
        assert!(!p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "<@UBOTX|other> hi"))
            .should_reply);
    }

    #[test]
    fn unknown_channel_kind_never_replies() {
        let d = policy().decide(&event(EventKind::Message, ChannelKind::Unknown, "<@UBOT> hi"));
        assert!(!d.should_reply);
    }

    #[test]
    fn without_bot_identity_channels_are_never_addressed() {
        let p = ReplyPolicy::new(&BotIdentity::new(None), ReplySourceKind::Static);
        assert!(!p
            .decide(&event(EventKind::Message, ChannelKind::MultiParty, "<@UBOT> hi"))
            .should_reply);
        assert!(p
            .decide(&event(EventKind::Message, ChannelKind::DirectMessage, "hi"))
            .should_reply);
    }

    #[test]
    fn blank_identity_is_unknown() {
        assert_eq!(BotIdentity::new(Some(String::new())).user_id, None);
        assert!(!BotIdentity::new(Some(String::new())).is_mentioned_in("<@> hi"));
        assert!(BotIdentity::new(Some("U9".into())).is_mentioned_in("hey <@U9>"));
    }
}
