//! # cosmos-dispatcher
//!
//! The bot's answering side: [`Dispatcher`] is a [`imbot_core::MessageHandler`] that extracts the
//! prompt from a routed message, asks a [`ResponseEngine`] for a reply with the thread's
//! continuation token, and sends the reply back through the same thread. [`ChatGptEngine`] is the
//! OpenAI-backed engine.

mod chatgpt;
mod dispatcher;
mod engine;
mod error;
mod prompt;

pub use chatgpt::{
    mask_token, ChatGptEngine, ConversationStore, Role, StoredMessage, DEFAULT_MAX_HISTORY,
    DEFAULT_MODEL, DEFAULT_STORE_CAPACITY,
};
pub use dispatcher::{conversation_key, Dispatcher, DEFAULT_ENGINE_TIMEOUT};
pub use engine::{EngineReply, ResponseEngine};
pub use error::{DispatchError, Result};
pub use prompt::{extract_prompt, DEFAULT_GREETING_PROMPT};
