//! Application config: a JSON file plus environment overrides.
//!
//! The file comes from `--config`, else `COSMOS_CONFIG`, else `./cosmos.json`. A missing default
//! file is not an error (everything may come from the environment); a missing explicit file is.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cosmos_dispatcher::{mask_token, DEFAULT_MODEL};
use imbot_wechat::{ActivityPolicy, WechatBotConfig, DEFAULT_LOGIN_QRCODE_PATH};
use serde::Deserialize;

use crate::console::ConsoleRoster;

pub const DEFAULT_CONFIG_FILE: &str = "cosmos.json";
pub const DEFAULT_LOG_FILE: &str = "logs/cosmos.log";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CosmosConfig {
    /// OPENAI_API_KEY overrides the file value.
    pub chatgpt_key: String,
    /// Group topics to serve.
    pub channel_whitelist: Vec<String>,
    /// Contact names or aliases to serve.
    pub dm_whitelist: Vec<String>,
    pub bot_name: String,
    /// Defaults to `bot_name`.
    pub wake_word: Option<String>,
    pub thread_reclaim_timeout_secs: u64,
    pub reclaim_interval_secs: u64,
    pub login_qrcode_path: PathBuf,
    pub log_file: String,
    pub openai_base_url: String,
    pub model: String,
    pub engine_timeout_secs: u64,
    pub refresh_activity_on_failed_send: bool,
    /// Rooms and contacts known to the console transport.
    pub console_roster: ConsoleRoster,
}

impl Default for CosmosConfig {
    fn default() -> Self {
        Self {
            chatgpt_key: String::new(),
            channel_whitelist: Vec::new(),
            dm_whitelist: Vec::new(),
            bot_name: "cosmos".to_string(),
            wake_word: None,
            thread_reclaim_timeout_secs: 30 * 60,
            reclaim_interval_secs: 60,
            login_qrcode_path: PathBuf::from(DEFAULT_LOGIN_QRCODE_PATH),
            log_file: DEFAULT_LOG_FILE.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            engine_timeout_secs: 120,
            refresh_activity_on_failed_send: false,
            console_roster: ConsoleRoster::default(),
        }
    }
}

impl CosmosConfig {
    /// Loads the file (see module docs), applies env overrides, and validates.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.or_else(|| env::var("COSMOS_CONFIG").ok().map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.chatgpt_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chatgpt_key.trim().is_empty() {
            anyhow::bail!("chatgpt_key is required (set it in the config file or OPENAI_API_KEY)");
        }
        if self.bot_name.trim().is_empty() {
            anyhow::bail!("bot_name must not be empty");
        }
        if self.wake_word().trim().is_empty() {
            anyhow::bail!("wake_word must not be empty");
        }
        if self.thread_reclaim_timeout_secs == 0 {
            anyhow::bail!("thread_reclaim_timeout_secs must be greater than 0");
        }
        if self.reclaim_interval_secs == 0 {
            anyhow::bail!("reclaim_interval_secs must be greater than 0");
        }
        if self.engine_timeout_secs == 0 {
            anyhow::bail!("engine_timeout_secs must be greater than 0");
        }
        if reqwest::Url::parse(&self.openai_base_url).is_err() {
            anyhow::bail!("openai_base_url is not a valid URL: {}", self.openai_base_url);
        }
        Ok(())
    }

    pub fn wake_word(&self) -> &str {
        self.wake_word.as_deref().unwrap_or(&self.bot_name)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn activity_policy(&self) -> ActivityPolicy {
        if self.refresh_activity_on_failed_send {
            ActivityPolicy::OnAttempt
        } else {
            ActivityPolicy::OnSuccess
        }
    }

    pub fn wechat_bot_config(&self) -> WechatBotConfig {
        WechatBotConfig::new(self.bot_name.clone())
            .with_wake_word(self.wake_word())
            .with_group_whitelist(self.channel_whitelist.clone())
            .with_user_whitelist(self.dm_whitelist.clone())
            .with_thread_reclaim_timeout(Duration::from_secs(self.thread_reclaim_timeout_secs))
            .with_reclaim_interval(Duration::from_secs(self.reclaim_interval_secs))
            .with_login_qrcode_path(self.login_qrcode_path.clone())
            .with_activity_policy(self.activity_policy())
    }

    /// Human-readable summary with the key masked.
    pub fn summary(&self) -> String {
        let lines = [
            format!("bot_name: {}", self.bot_name),
            format!("wake_word: {}", self.wake_word()),
            format!("chatgpt_key: {}", mask_token(&self.chatgpt_key)),
            format!("channel_whitelist: {:?}", self.channel_whitelist),
            format!("dm_whitelist: {:?}", self.dm_whitelist),
            format!("thread_reclaim_timeout_secs: {}", self.thread_reclaim_timeout_secs),
            format!("reclaim_interval_secs: {}", self.reclaim_interval_secs),
            format!("login_qrcode_path: {}", self.login_qrcode_path.display()),
            format!("log_file: {}", self.log_file),
            format!("openai_base_url: {}", self.openai_base_url),
            format!("model: {}", self.model),
            format!("engine_timeout_secs: {}", self.engine_timeout_secs),
            format!("activity_policy: {:?}", self.activity_policy()),
        ];
        lines.join("\n")
    }
}
