//! Communication channels (Slack).
//!
//! Inbound payloads are normalized into [`InboundEvent`]; replies leave through a
//! [`DeliveryGateway`], implemented for Slack by [`SlackClient`].

mod delivery;
mod inbound;
mod slack;

pub use delivery::DeliveryGateway;
pub use inbound::{ChannelKind, EventKind, InboundEvent};
pub use slack::{SlackClient, SlackError, SlackEvent, WebhookPayload};
