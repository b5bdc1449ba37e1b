//! Core capability traits: participant, thread, channel, and the inbound [`Message`].
//!
//! Backends provide one concrete variant of each trait; routing code above them only sees these
//! interfaces.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::Result;

/// Anything with a stable network identifier.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Anything text can be sent to.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Sends `content`. Transport failures are returned to the caller.
    async fn send(&self, content: &str) -> Result<()>;
}

/// A network contact. Equality is by [`Identifiable::id`].
pub trait Participant: Identifiable + Send + Sync + fmt::Debug {
    /// Current display name as reported by the network layer.
    fn name(&self) -> String;
    /// True iff this is the bot's own identity.
    fn is_myself(&self) -> bool;
}

/// A conversation inside a [`Channel`], scoped to a participant set.
pub trait Thread: Identifiable + Sender {
    /// Owning channel; `None` once the channel has been dropped.
    fn channel(&self) -> Option<Arc<dyn Channel>>;
    fn participants(&self) -> Vec<Arc<dyn Participant>>;
    /// True for the whole-channel thread.
    fn is_default(&self) -> bool;
    fn last_active(&self) -> Instant;
}

/// A network conversation surface (group room or direct peer).
pub trait Channel: Identifiable + Sender {
    /// Full roster captured when the channel was registered.
    fn participants(&self) -> Vec<Arc<dyn Participant>>;
    fn find_thread(&self, id: &str) -> Option<Arc<dyn Thread>>;
    fn default_thread(&self) -> Arc<dyn Thread>;
    /// Ids of all live threads, default thread included.
    fn thread_ids(&self) -> Vec<String>;
}

/// One inbound message, resolved to its thread. Built per event and handed to handlers.
#[derive(Clone)]
pub struct Message {
    thread: Arc<dyn Thread>,
    from: Arc<dyn Participant>,
    cc: Vec<Arc<dyn Participant>>,
    content: String,
    received_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        thread: Arc<dyn Thread>,
        from: Arc<dyn Participant>,
        cc: Vec<Arc<dyn Participant>>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            thread,
            from,
            cc,
            content: content.into(),
            received_at: Utc::now(),
        }
    }

    pub fn thread(&self) -> &Arc<dyn Thread> {
        &self.thread
    }

    pub fn from(&self) -> &Arc<dyn Participant> {
        &self.from
    }

    /// Additional addressed participants; never contains the bot itself.
    pub fn cc(&self) -> &[Arc<dyn Participant>] {
        &self.cc
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("thread", &self.thread.id())
            .field("from", &self.from.id())
            .field(
                "cc",
                &self.cc.iter().map(|p| p.id().to_string()).collect::<Vec<_>>(),
            )
            .field("content", &self.content)
            .field("received_at", &self.received_at)
            .finish()
    }
}
