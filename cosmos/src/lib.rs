//! # cosmos
//!
//! Application crate: JSON/env [`CosmosConfig`], the console [`ConsolePuppet`] transport, and the
//! runner that connects [`imbot_wechat::WechatBot`] to [`cosmos_dispatcher::Dispatcher`].

pub mod cli;
pub mod config;
pub mod console;
pub mod runner;

pub use config::CosmosConfig;
pub use console::{ConsolePuppet, ConsoleRoom, ConsoleRoster, OutgoingLine};
pub use runner::{build_bot, chatgpt_engine, run_bot};
