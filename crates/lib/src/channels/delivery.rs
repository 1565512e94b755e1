//! Outbound delivery seam: anything that can post text into a channel.

use async_trait::async_trait;

/// Sends a text message to a channel on the messaging platform.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Post `text` to `channel_id`. Err carries a human-readable reason.
    async fn deliver(&self, channel_id: &str, text: &str) -> Result<(), String>;
}
