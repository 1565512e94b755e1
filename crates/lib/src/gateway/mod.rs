//! Gateway: HTTP surface and the per-webhook event dispatcher.
//!
//! Single port serves the Slack Events webhook, the transcript read endpoint and a
//! health probe. Each webhook call is dispatched independently.

mod dispatch;
mod server;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use server::{
    resolve_bot_identity, router, run_gateway, select_reply_source, GatewayState,
};
