//! WeChat room or contact as a [`Channel`]: owns its threads and reclaims idle ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use imbot_core::{
    is_default_key, thread_key, Channel, Identifiable, Participant, Result, Sender, Thread,
    DEFAULT_THREAD_ID,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::participant::WechatParticipant;
use crate::puppet::Puppet;
use crate::thread::{ActivityPolicy, WechatThread};

/// Which kind of network surface a channel wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Room,
    Contact,
}

/// [`Channel`] over a WeChat room or contact.
///
/// The thread map has its own mutex so that [`WechatChannel::find_or_add_thread`] and
/// [`WechatChannel::reclaim_threads`] never interleave on the same channel. The lock is never
/// held across an await.
pub struct WechatChannel {
    id: String,
    kind: ChannelKind,
    puppet: Arc<dyn Puppet>,
    participants: Vec<Arc<WechatParticipant>>,
    threads: Mutex<HashMap<String, Arc<WechatThread>>>,
    thread_timeout: Duration,
    policy: ActivityPolicy,
    self_ref: Weak<WechatChannel>,
}

impl WechatChannel {
    /// Creates the channel together with its default thread.
    pub fn new(
        id: impl Into<String>,
        kind: ChannelKind,
        puppet: Arc<dyn Puppet>,
        participants: Vec<WechatParticipant>,
        thread_timeout: Duration,
        policy: ActivityPolicy,
    ) -> Arc<Self> {
        let id = id.into();
        let participants: Vec<Arc<WechatParticipant>> =
            participants.into_iter().map(Arc::new).collect();

        Arc::new_cyclic(|self_ref: &Weak<WechatChannel>| {
            let default_thread = Arc::new(WechatThread::new(
                DEFAULT_THREAD_ID.to_string(),
                id.clone(),
                self_ref.clone(),
                participants.clone(),
                policy,
            ));
            let mut threads = HashMap::new();
            threads.insert(DEFAULT_THREAD_ID.to_string(), default_thread);

            Self {
                id,
                kind,
                puppet,
                participants,
                threads: Mutex::new(threads),
                thread_timeout,
                policy,
                self_ref: self_ref.clone(),
            }
        })
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn thread_timeout(&self) -> Duration {
        self.thread_timeout
    }

    pub fn roster(&self) -> &[Arc<WechatParticipant>] {
        &self.participants
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<String, Arc<WechatThread>>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolves the thread addressed by `participants`, creating it if needed.
    ///
    /// The key is order-insensitive and ignores duplicates; an empty set resolves to the default
    /// thread. A new thread stores its participants deduplicated and sorted by id.
    pub fn find_or_add_thread(&self, participants: &[Arc<WechatParticipant>]) -> Arc<WechatThread> {
        let key = thread_key(participants.iter().map(|p| p.id()));
        let mut threads = self.threads();

        if let Some(thread) = threads.get(&key) {
            return thread.clone();
        }

        let mut members: Vec<Arc<WechatParticipant>> = participants.to_vec();
        members.sort_by(|a, b| a.id().cmp(b.id()));
        members.dedup_by(|a, b| a.id() == b.id());

        let thread = Arc::new(WechatThread::new(
            key.clone(),
            self.id.clone(),
            self.self_ref.clone(),
            members,
            self.policy,
        ));
        threads.insert(key.clone(), thread.clone());
        debug!(channel_id = %self.id, thread_id = %key, "thread created");
        thread
    }

    pub fn default_wechat_thread(&self) -> Arc<WechatThread> {
        let existing = self.threads().get(DEFAULT_THREAD_ID).cloned();
        // Always present while reclamation skips the default key; rebuilt rather than panicking.
        existing.unwrap_or_else(|| self.find_or_add_thread(&[]))
    }

    pub fn find_wechat_thread(&self, id: &str) -> Option<Arc<WechatThread>> {
        self.threads().get(id).cloned()
    }

    /// Number of live threads, default thread included.
    pub fn thread_count(&self) -> usize {
        self.threads().len()
    }

    /// Removes every non-default thread idle for longer than the timeout. Returns how many were
    /// removed.
    pub fn reclaim_threads(&self) -> usize {
        let now = Instant::now();
        let timeout = self.thread_timeout;
        let mut threads = self.threads();
        let before = threads.len();

        threads.retain(|key, thread| is_default_key(key) || thread.idle_for(now) <= timeout);

        let removed = before - threads.len();
        if removed > 0 {
            info!(
                channel_id = %self.id,
                kind = ?self.kind,
                removed,
                remaining = threads.len(),
                "idle threads reclaimed"
            );
        }
        removed
    }
}

impl Identifiable for WechatChannel {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Sender for WechatChannel {
    async fn send(&self, content: &str) -> Result<()> {
        self.puppet.say(&self.id, content).await
    }
}

impl Channel for WechatChannel {
    fn participants(&self) -> Vec<Arc<dyn Participant>> {
        self.participants
            .iter()
            .map(|p| p.clone() as Arc<dyn Participant>)
            .collect()
    }

    fn find_thread(&self, id: &str) -> Option<Arc<dyn Thread>> {
        self.find_wechat_thread(id)
            .map(|thread| thread as Arc<dyn Thread>)
    }

    fn default_thread(&self) -> Arc<dyn Thread> {
        self.default_wechat_thread()
    }

    fn thread_ids(&self) -> Vec<String> {
        self.threads().keys().cloned().collect()
    }
}
