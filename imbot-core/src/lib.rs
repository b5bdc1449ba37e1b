//! # imbot-core
//!
//! Core types and traits for instant-messaging bots: [`Participant`], [`Thread`], [`Channel`],
//! [`Message`], the [`Bot`] façade and [`MessageHandler`] fan-out, thread-key derivation, and
//! tracing initialization. Network-agnostic; used by imbot-wechat and cosmos-dispatcher.

pub mod bot;
pub mod error;
pub mod logger;
pub mod thread_key;
pub mod types;

pub use bot::{handler_fn, Bot, BotEventType, FnHandler, HandlerRegistry, MessageHandler};
pub use error::{ImbotError, Result};
pub use logger::{default_directives, init_tracing, WORKSPACE_CRATES};
pub use thread_key::{is_default_key, thread_key, DEFAULT_THREAD_ID, THREAD_KEY_DELIMITER};
pub use types::{Channel, Identifiable, Message, Participant, Sender, Thread};
