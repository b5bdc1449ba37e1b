//! Wires config, transport, bot, and dispatcher together and runs until stopped.

use std::sync::Arc;

use anyhow::{Context, Result};
use cosmos_dispatcher::{mask_token, ChatGptEngine, Dispatcher, ResponseEngine};
use imbot_core::{init_tracing, Bot, BotEventType};
use imbot_wechat::{Puppet, WechatBot};
use tracing::{error, info};

use crate::config::CosmosConfig;
use crate::console::ConsolePuppet;

/// The OpenAI engine described by `config`.
pub fn chatgpt_engine(config: &CosmosConfig) -> ChatGptEngine {
    ChatGptEngine::with_base_url(config.chatgpt_key.clone(), config.openai_base_url.clone())
        .with_model(config.model.clone())
}

/// Builds the bot over `puppet` with a dispatcher for `engine` registered.
pub fn build_bot(
    config: &CosmosConfig,
    puppet: Arc<dyn Puppet>,
    engine: Arc<dyn ResponseEngine>,
) -> Arc<WechatBot> {
    let dispatcher = Dispatcher::new(engine, config.bot_name.clone(), config.wake_word())
        .with_engine_timeout(config.engine_timeout());

    let bot = Arc::new(WechatBot::new(puppet, config.wechat_bot_config()));
    bot.on(BotEventType::Message, Arc::new(dispatcher));
    bot
}

/// Runs the bot over the console transport until ctrl-c or end of input.
pub async fn run_bot(config: CosmosConfig) -> Result<()> {
    init_tracing(&config.log_file)?;

    info!(
        bot_name = %config.bot_name,
        wake_word = %config.wake_word(),
        groups = config.channel_whitelist.len(),
        friends = config.dm_whitelist.len(),
        model = %config.model,
        api_key = %mask_token(&config.chatgpt_key),
        "Starting cosmos"
    );

    let puppet = Arc::new(ConsolePuppet::stdio(config.console_roster.clone()));
    let bot = build_bot(&config, puppet, Arc::new(chatgpt_engine(&config)));

    let stopper = bot.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping");
            if let Err(e) = stopper.stop().await {
                error!(error = %e, "stop failed");
            }
        }
    });

    bot.run().await.context("bot run failed")?;
    info!("cosmos stopped");
    Ok(())
}
