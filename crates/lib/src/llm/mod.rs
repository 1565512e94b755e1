//! Reply text sources: a static echo and the Gemini text-generation client.
//!
//! The gateway picks one [`ReplySource`] at startup from `reply.mode`; the dispatcher
//! only sees the trait.

mod echo;
mod gemini;

pub use echo::EchoReply;
pub use gemini::GeminiClient;

use crate::config::ReplySourceKind;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
    #[error("generation response had no text")]
    EmptyResponse,
}

/// Produces the reply text for a prompt.
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Which kind of source this is (reported in decisions and health).
    fn kind(&self) -> ReplySourceKind;

    /// Reply text for `prompt`.
    async fn compose(&self, prompt: &str) -> Result<String, GenerationError>;
}
