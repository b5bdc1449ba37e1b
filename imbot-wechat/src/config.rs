//! Bot settings consumed by [`crate::WechatBot`]. Loading them is the caller's job.

use std::path::PathBuf;
use std::time::Duration;

use crate::thread::ActivityPolicy;

/// Default idle time before a sub-thread is reclaimed.
pub const DEFAULT_THREAD_RECLAIM_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default period of the reclamation sweep.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);
/// Default file the login QR code is written to.
pub const DEFAULT_LOGIN_QRCODE_PATH: &str = "/tmp/.wechat_qrcode";

#[derive(Debug, Clone)]
pub struct WechatBotConfig {
    /// Display name of the bot account.
    pub bot_name: String,
    /// Group messages starting with this word are handled without an @-mention.
    pub wake_word: String,
    pub thread_reclaim_timeout: Duration,
    pub reclaim_interval: Duration,
    /// Room topics to accept group messages from.
    pub group_whitelist: Vec<String>,
    /// Contact names or aliases to accept direct messages from.
    pub user_whitelist: Vec<String>,
    pub login_qrcode_path: PathBuf,
    pub activity_policy: ActivityPolicy,
}

impl WechatBotConfig {
    /// Config with defaults; the wake word is the bot name.
    pub fn new(bot_name: impl Into<String>) -> Self {
        let bot_name = bot_name.into();
        Self {
            wake_word: bot_name.clone(),
            bot_name,
            thread_reclaim_timeout: DEFAULT_THREAD_RECLAIM_TIMEOUT,
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
            group_whitelist: Vec::new(),
            user_whitelist: Vec::new(),
            login_qrcode_path: PathBuf::from(DEFAULT_LOGIN_QRCODE_PATH),
            activity_policy: ActivityPolicy::default(),
        }
    }

    pub fn with_wake_word(mut self, wake_word: impl Into<String>) -> Self {
        self.wake_word = wake_word.into();
        self
    }

    pub fn with_thread_reclaim_timeout(mut self, timeout: Duration) -> Self {
        self.thread_reclaim_timeout = timeout;
        self
    }

    pub fn with_reclaim_interval(mut self, interval: Duration) -> Self {
        self.reclaim_interval = interval;
        self
    }

    pub fn with_group_whitelist(mut self, groups: Vec<String>) -> Self {
        self.group_whitelist = groups;
        self
    }

    pub fn with_user_whitelist(mut self, users: Vec<String>) -> Self {
        self.user_whitelist = users;
        self
    }

    pub fn with_login_qrcode_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.login_qrcode_path = path.into();
        self
    }

    pub fn with_activity_policy(mut self, policy: ActivityPolicy) -> Self {
        self.activity_policy = policy;
        self
    }
}
