//! The response engine seam.

use async_trait::async_trait;

use crate::error::Result;

/// One engine turn: the reply text and the token that continues the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineReply {
    pub text: String,
    /// Pass back as `continuation` on the next turn of the same thread. `None` ends continuity.
    pub token: Option<String>,
}

impl EngineReply {
    pub fn new(text: impl Into<String>, token: Option<String>) -> Self {
        Self {
            text: text.into(),
            token,
        }
    }
}

/// Produces a reply for a prompt, optionally continuing an earlier exchange.
#[async_trait]
pub trait ResponseEngine: Send + Sync {
    async fn complete(&self, prompt: &str, continuation: Option<String>) -> Result<EngineReply>;
}
