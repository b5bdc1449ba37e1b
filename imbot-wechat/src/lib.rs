//! # imbot-wechat
//!
//! WeChat-style backend for [`imbot_core`]: [`WechatParticipant`], [`WechatThread`],
//! [`WechatChannel`] and the [`WechatBot`] façade. The network session itself sits behind the
//! [`Puppet`] trait; this crate only models rooms, contacts, and threads and routes messages.

mod bot;
mod channel;
mod config;
mod login_qrcode;
mod participant;
mod puppet;
mod registry;
mod thread;

pub use bot::{DropReason, RouteOutcome, WechatBot};
pub use channel::{ChannelKind, WechatChannel};
pub use config::{
    WechatBotConfig, DEFAULT_LOGIN_QRCODE_PATH, DEFAULT_RECLAIM_INTERVAL,
    DEFAULT_THREAD_RECLAIM_TIMEOUT,
};
pub use login_qrcode::{render_login_qrcode, write_login_qrcode};
pub use participant::WechatParticipant;
pub use puppet::{Contact, IncomingMessage, MessageKind, Puppet, PuppetEvent, Room, ScanStatus};
pub use registry::ChannelRegistry;
pub use thread::{ActivityPolicy, WechatThread};
