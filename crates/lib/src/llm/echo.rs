//! Static reply source: echoes the inbound text back.

use crate::config::ReplySourceKind;
use crate::llm::{GenerationError, ReplySource};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoReply;

#[async_trait]
impl ReplySource for EchoReply {
    fn kind(&self) -> ReplySourceKind {
        ReplySourceKind::Static
    }

    async fn compose(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(format!("Hello! You said: \"{}\"", prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_prompt() {
        let reply = EchoReply.compose("hi").await.unwrap();
        assert_eq!(reply, "Hello! You said: \"hi\"");
        assert_eq!(EchoReply.kind(), ReplySourceKind::Static);
    }
}
