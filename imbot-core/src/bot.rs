//! Bot façade abstraction and message handler fan-out.
//!
//! [`Bot`] is transport-agnostic; backends (e.g. `imbot-wechat`) implement it and use
//! [`HandlerRegistry`] to deliver each routed [`Message`] to every registered [`MessageHandler`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, Instrument};

use crate::error::Result;
use crate::types::{Channel, Message};

/// Event kinds a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BotEventType {
    /// A message that passed filtering and was resolved to a thread.
    Message,
}

/// Consumer of routed messages (e.g. the reply dispatcher).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Adapts an async closure into a [`MessageHandler`].
pub struct FnHandler<F>(F);

/// Wraps `f` as a shareable handler for [`Bot::on`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> Result<()> {
        (self.0)(message).await
    }
}

/// Instant-messaging bot: owns the network session and routes its events to handlers.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Starts the session and processes events until [`Bot::stop`] or the transport ends.
    async fn run(&self) -> Result<()>;
    /// Stops the session; a running [`Bot::run`] returns shortly after.
    async fn stop(&self) -> Result<()>;
    /// Resolves a whitelisted group channel by its display name.
    async fn find_channel(&self, name: &str) -> Result<Option<Arc<dyn Channel>>>;
    /// Resolves a whitelisted direct-message peer by name or alias.
    async fn find_dm(&self, name: &str) -> Result<Option<Arc<dyn Channel>>>;
    /// Registers `handler` for `event`. Handlers run in registration order.
    fn on(&self, event: BotEventType, handler: Arc<dyn MessageHandler>);
}

/// Per-event handler lists with fire-and-forget dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<BotEventType, Vec<Arc<dyn MessageHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event: BotEventType, handler: Arc<dyn MessageHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event).or_default().push(handler);
    }

    /// Number of handlers registered for `event`.
    pub fn count(&self, event: BotEventType) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&event).map(Vec::len).unwrap_or(0)
    }

    /// Spawns one task per handler for `event`, in registration order, without waiting for any.
    ///
    /// A failing or panicking handler only ends its own task. Must be called inside a tokio
    /// runtime. The returned handles are for observation; dropping them detaches the tasks.
    pub fn dispatch(&self, event: BotEventType, message: &Message) -> Vec<JoinHandle<()>> {
        let handlers: Vec<Arc<dyn MessageHandler>> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&event).cloned().unwrap_or_default()
        };

        handlers
            .into_iter()
            .enumerate()
            .map(|(index, handler)| {
                let message = message.clone();
                let span = tracing::info_span!(
                    "message_handler",
                    handler = index,
                    thread_id = %message.thread().id(),
                );
                tokio::spawn(
                    async move {
                        debug!("step: handler started");
                        if let Err(e) = handler.handle(message).await {
                            error!(error = %e, "Message handler failed");
                        }
                    }
                    .instrument(span),
                )
            })
            .collect()
    }
}
