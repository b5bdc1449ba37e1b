//! [`Dispatcher`]: the message handler that turns routed messages into engine replies.
//!
//! Each thread carries its own continuation token, so sub-threads of one room hold independent
//! conversations with the engine. Tokens live in memory only and are overwritten every turn.
//!
//! Thread ids are only unique within a channel (every default thread is `|default|`), so tokens
//! are keyed by [`conversation_key`]. An entry dies with its thread: once the channel has
//! reclaimed the thread and no message holds it, the token is dropped at the next write.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use imbot_core::{Identifiable, Message, MessageHandler, Sender, Thread};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::engine::ResponseEngine;
use crate::error::{DispatchError, Result};
use crate::prompt::extract_prompt;

/// Default bound on one engine call.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

/// `<channel id>#<thread id>`, or the bare thread id for a thread without a live channel.
pub fn conversation_key(thread: &dyn Thread) -> String {
    match thread.channel() {
        Some(channel) => format!("{}#{}", channel.id(), thread.id()),
        None => thread.id().to_string(),
    }
}

/// Continuation token of one live thread.
struct Tracked {
    token: String,
    thread: Weak<dyn Thread>,
}

impl Tracked {
    fn is_live(&self) -> bool {
        self.thread.strong_count() > 0
    }
}

pub struct Dispatcher {
    engine: Arc<dyn ResponseEngine>,
    bot_name: String,
    wake_word: String,
    engine_timeout: Duration,
    /// conversation key -> continuation token
    tokens: RwLock<HashMap<String, Tracked>>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn ResponseEngine>,
        bot_name: impl Into<String>,
        wake_word: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            bot_name: bot_name.into(),
            wake_word: wake_word.into(),
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// Continuation token currently stored under `key` (see [`conversation_key`]).
    /// Tokens of threads that no longer exist are never returned.
    pub async fn continuation(&self, key: &str) -> Option<String> {
        self.tokens
            .read()
            .await
            .get(key)
            .filter(|tracked| tracked.is_live())
            .map(|tracked| tracked.token.clone())
    }

    /// Number of live threads holding a token.
    pub async fn tracked_threads(&self) -> usize {
        self.tokens
            .read()
            .await
            .values()
            .filter(|tracked| tracked.is_live())
            .count()
    }

    /// Asks the engine for a reply to `message` and sends it through the message's thread.
    ///
    /// Returns the reply text, or `None` when the engine answered with nothing. On engine failure
    /// or timeout the stored token is left as it was.
    #[instrument(skip(self, message), fields(thread_id = %message.thread().id(), from = %message.from().id()))]
    pub async fn respond(&self, message: &Message) -> Result<Option<String>> {
        let thread = message.thread();
        let key = conversation_key(thread.as_ref());
        let prompt = extract_prompt(message.content(), &self.bot_name, &self.wake_word);
        let continuation = self.continuation(&key).await;
        debug!(continued = continuation.is_some(), "calling response engine");

        let reply = tokio::time::timeout(
            self.engine_timeout,
            self.engine.complete(&prompt, continuation),
        )
        .await
        .map_err(|_| {
            warn!(timeout = ?self.engine_timeout, "response engine timed out");
            DispatchError::Timeout(self.engine_timeout)
        })??;

        {
            let mut tokens = self.tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, tracked| tracked.is_live());
            let pruned = before - tokens.len();
            if pruned > 0 {
                debug!(pruned, "dropped tokens of reclaimed threads");
            }
            match reply.token {
                Some(token) => {
                    tokens.insert(
                        key,
                        Tracked {
                            token,
                            thread: Arc::downgrade(thread),
                        },
                    );
                }
                None => {
                    tokens.remove(&key);
                }
            }
        }

        if reply.text.is_empty() {
            info!("engine returned an empty reply, nothing sent");
            return Ok(None);
        }
        thread.send(&reply.text).await?;
        info!(reply_len = reply.text.len(), "reply sent");
        Ok(Some(reply.text))
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: Message) -> imbot_core::Result<()> {
        self.respond(&message).await?;
        Ok(())
    }
}
