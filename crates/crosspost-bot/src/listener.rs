use std::sync::Arc;
use std::time::Duration;

use teloxide::{
    ApiError, RequestError,
    prelude::*,
    types::{AllowedUpdate, BotCommand},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crosspost_core::{ChannelRegistry, Ingestor, Linker};

use crate::dispatch::Dispatcher;
use crate::event::BotEvent;
use crate::handlers::{BotContext, build_dispatcher};

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;
/// HTTP client timeout; must outlast the long poll.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(45);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Core services the bot drives.
#[derive(Clone)]
pub struct Services {
    pub linker: Linker,
    pub channels: ChannelRegistry,
    pub ingestor: Ingestor,
}

/// Connect the bot and spawn the polling loop.
///
/// The loop runs until `cancel` fires or Telegram reports another poller on
/// the same token. Errors from individual updates are logged and skipped.
pub async fn start_polling(
    token: &str,
    services: Services,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(CLIENT_TIMEOUT)
        .build()?;
    let bot = Bot::with_client(token, client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    let commands = vec![BotCommand::new("start", "Connect your account")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let dispatcher = build_dispatcher(BotContext {
        linker: services.linker,
        channels: services.channels,
        ingestor: services.ingestor,
        admins: Arc::new(bot.clone()),
        replier: Arc::new(bot.clone()),
        bot_user_id: me.id.0,
    });

    Ok(tokio::spawn(poll(bot, dispatcher, cancel)))
}

async fn poll(bot: Bot, dispatcher: Dispatcher, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![
                AllowedUpdate::Message,
                AllowedUpdate::ChannelPost,
                AllowedUpdate::EditedChannelPost,
            ]);

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    let Some(event) = BotEvent::from_update(&update) else {
                        debug!(update_id = update.id.0, "ignoring update");
                        continue;
                    };
                    let kind = event.kind();
                    if let Err(e) = dispatcher.dispatch(event).await {
                        error!(?kind, error = %e, "error handling telegram update");
                    }
                }
            }
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is running with this token");
                break;
            }
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("telegram polling stopped");
}
