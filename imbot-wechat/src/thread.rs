//! Sub-conversation inside a channel, addressed by a participant set.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use imbot_core::{
    is_default_key, Channel, Identifiable, ImbotError, Participant, Result, Sender, Thread,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::channel::WechatChannel;
use crate::participant::WechatParticipant;

/// When a send refreshes the thread's activity timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityPolicy {
    /// Only after the transport confirmed the send.
    #[default]
    OnSuccess,
    /// On every send attempt, failed ones included.
    OnAttempt,
}

/// [`Thread`] of a [`WechatChannel`]. Non-default threads prefix outgoing text with one
/// `@name ` token per participant so the sub-group is addressed inside the room.
pub struct WechatThread {
    id: String,
    channel_id: String,
    channel: Weak<WechatChannel>,
    participants: Vec<Arc<WechatParticipant>>,
    last_active: Mutex<Instant>,
    policy: ActivityPolicy,
}

impl WechatThread {
    pub(crate) fn new(
        id: String,
        channel_id: String,
        channel: Weak<WechatChannel>,
        participants: Vec<Arc<WechatParticipant>>,
        policy: ActivityPolicy,
    ) -> Self {
        Self {
            id,
            channel_id,
            channel,
            participants,
            last_active: Mutex::new(Instant::now()),
            policy,
        }
    }

    /// Id of the owning channel (available even after the channel is gone).
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn wechat_participants(&self) -> &[Arc<WechatParticipant>] {
        &self.participants
    }

    /// Marks the thread active now.
    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Time since last activity, as seen at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active())
    }

    fn mention_prefix(&self) -> String {
        if self.is_default() {
            return String::new();
        }
        self.participants
            .iter()
            .map(|p| format!("@{} ", p.name()))
            .collect()
    }
}

impl Identifiable for WechatThread {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Sender for WechatThread {
    #[instrument(skip(self, content), fields(thread_id = %self.id, channel_id = %self.channel_id))]
    async fn send(&self, content: &str) -> Result<()> {
        let channel = self
            .channel
            .upgrade()
            .ok_or_else(|| ImbotError::ChannelGone(self.channel_id.clone()))?;

        let text = format!("{}{}", self.mention_prefix(), content);
        let result = channel.send(&text).await;

        let refresh = match self.policy {
            ActivityPolicy::OnSuccess => result.is_ok(),
            ActivityPolicy::OnAttempt => true,
        };
        if refresh {
            self.touch();
        }
        debug!(ok = result.is_ok(), refreshed = refresh, "thread send finished");

        result
    }
}

impl Thread for WechatThread {
    fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel
            .upgrade()
            .map(|channel| channel as Arc<dyn Channel>)
    }

    fn participants(&self) -> Vec<Arc<dyn Participant>> {
        self.participants
            .iter()
            .map(|p| p.clone() as Arc<dyn Participant>)
            .collect()
    }

    fn is_default(&self) -> bool {
        is_default_key(&self.id)
    }

    fn last_active(&self) -> Instant {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner())
    }
}
