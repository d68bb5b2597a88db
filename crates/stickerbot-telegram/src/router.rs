use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::Message};

use stickerbot_core::{
    commands::{CommandRouter, DispatchOutcome},
    config::Config,
    domain::UserId,
    handlers::BotServices,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::{SpeechSynthesizer, VisionClient},
};

use crate::{convert::inbound_from_message, TelegramMessenger};

/// Optional external collaborators, built by the binary.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub vision: Option<Arc<dyn VisionClient>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

pub async fn run_polling(cfg: Arc<Config>, collaborators: Collaborators) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    tracing::info!(
        username = %me.username(),
        vision = collaborators.vision.is_some(),
        speech = collaborators.speech.is_some(),
        owner = cfg.owner_id.is_some(),
        "stickerbot started"
    );

    // Throttle on top of the adapter's RetryAfter retry to stay clear of 429s.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot.clone(),
        UserId(me.id.0.to_string()),
    ));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let services = Arc::new(BotServices::from_config(
        &cfg,
        messenger,
        collaborators.vision,
        collaborators.speech,
    )?);
    let router = Arc::new(CommandRouter::from_config(&cfg, services)?);

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, router: Arc<CommandRouter>) -> ResponseResult<()> {
    let Some(inbound) = inbound_from_message(&msg) else {
        return Ok(());
    };

    let outcome = router.dispatch(&inbound).await;
    if outcome != DispatchOutcome::Ignored {
        tracing::debug!(chat = %inbound.chat_id(), ?outcome, "message dispatched");
    }
    Ok(())
}
