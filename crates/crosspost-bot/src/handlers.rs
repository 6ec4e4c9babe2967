use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crosspost_core::{ChannelRegistry, Error as CoreError, Ingestor, Linker};

use crate::admins::ChatAdmins;
use crate::dispatch::{Dispatcher, EventHandler};
use crate::event::{BotEvent, EventKind};
use crate::reply::Replier;
use crate::Result;

const WELCOME: &str = "Welcome to AI Cross-Post!\n\
    Please use the setup link from the web interface to connect your account.";
const LINKED: &str = "✅ Successfully connected!\n\n\
    Now you can:\n\
    1. Add me to your channel as an admin\n\
    2. Forward any message from your channel to verify ownership";
const BAD_TOKEN: &str = "❌ Invalid or expired setup token. Please try again with a valid token.";
const NOT_LINKED: &str =
    "❌ Please connect your account first using the setup link from the web interface.";
const BOT_NOT_ADMIN: &str = "❌ I need to be an admin in the channel first!\n\
    Please add me as an admin with these permissions:\n\
    - Read Messages\n\
    - Send Messages\n\
    - Edit Messages\n\
    - Delete Messages";
const USER_NOT_ADMIN: &str = "❌ You need to be an admin in the channel to connect it.";
const VERIFY_FAILED: &str = "❌ Error verifying channel. Please try again.";

/// Run a store-touching call off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> crosspost_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// Everything the handlers need, built once at start-up.
#[derive(Clone)]
pub struct BotContext {
    pub linker: Linker,
    pub channels: ChannelRegistry,
    pub ingestor: Ingestor,
    pub admins: Arc<dyn ChatAdmins>,
    pub replier: Arc<dyn Replier>,
    /// The bot's own Telegram user id, for the channel admin check.
    pub bot_user_id: u64,
}

pub fn build_dispatcher(ctx: BotContext) -> Dispatcher {
    let posts: Arc<dyn EventHandler> = Arc::new(PostHandler {
        ingestor: ctx.ingestor.clone(),
    });

    Dispatcher::new()
        .on(
            EventKind::Start,
            Arc::new(StartHandler {
                linker: ctx.linker.clone(),
                replier: ctx.replier.clone(),
            }),
        )
        .on(
            EventKind::ForwardedFromChannel,
            Arc::new(ChannelClaimHandler {
                channels: ctx.channels.clone(),
                admins: ctx.admins.clone(),
                replier: ctx.replier.clone(),
                bot_user_id: ctx.bot_user_id,
            }),
        )
        .on(EventKind::ChannelPost, posts.clone())
        .on(EventKind::EditedChannelPost, posts)
}

/// `/start <token>` redeems a setup token for the sender's Telegram id.
pub struct StartHandler {
    linker: Linker,
    replier: Arc<dyn Replier>,
}

#[async_trait]
impl EventHandler for StartHandler {
    async fn handle(&self, event: BotEvent) -> Result<()> {
        let BotEvent::Start {
            chat_id,
            telegram_user_id,
            token,
        } = event
        else {
            return Ok(());
        };

        let Some(token) = token else {
            return self.replier.reply(chat_id, WELCOME).await;
        };

        let linker = self.linker.clone();
        let redeemed =
            tokio::task::spawn_blocking(move || linker.verify(&token, telegram_user_id)).await?;

        match redeemed {
            Ok(owner_id) => {
                info!(owner_id, telegram_user_id, "linked via /start");
                self.replier.reply(chat_id, LINKED).await
            }
            Err(CoreError::InvalidToken | CoreError::TokenExpired) => {
                self.replier.reply(chat_id, BAD_TOKEN).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A forwarded channel message claims that channel for the sender's owner,
/// provided both the sender and the bot administer it.
pub struct ChannelClaimHandler {
    channels: ChannelRegistry,
    admins: Arc<dyn ChatAdmins>,
    replier: Arc<dyn Replier>,
    bot_user_id: u64,
}

impl ChannelClaimHandler {
    async fn both_admins(&self, channel_id: i64, user_id: u64) -> Result<Option<&'static str>> {
        if !self.admins.is_admin(channel_id, self.bot_user_id).await? {
            return Ok(Some(BOT_NOT_ADMIN));
        }
        if !self.admins.is_admin(channel_id, user_id).await? {
            return Ok(Some(USER_NOT_ADMIN));
        }
        Ok(None)
    }
}

#[async_trait]
impl EventHandler for ChannelClaimHandler {
    async fn handle(&self, event: BotEvent) -> Result<()> {
        let BotEvent::ForwardedFromChannel {
            chat_id,
            telegram_user_id,
            channel_id,
            channel_title,
        } = event
        else {
            return Ok(());
        };

        let channels = self.channels.clone();
        if blocking(move || channels.owner_of(telegram_user_id))
            .await?
            .is_none()
        {
            return self.replier.reply(chat_id, NOT_LINKED).await;
        }

        let Ok(user_id) = u64::try_from(telegram_user_id) else {
            return self.replier.reply(chat_id, USER_NOT_ADMIN).await;
        };

        match self.both_admins(channel_id, user_id).await {
            Ok(None) => {}
            Ok(Some(refusal)) => return self.replier.reply(chat_id, refusal).await,
            Err(e) => {
                warn!(channel_id, telegram_user_id, error = %e, "channel admin check failed");
                return self.replier.reply(chat_id, VERIFY_FAILED).await;
            }
        }

        let channels = self.channels.clone();
        let title = channel_title.clone();
        blocking(move || channels.link_channel(telegram_user_id, channel_id, &title)).await?;

        let text = format!(
            "✅ Channel successfully connected!\n\n\
             Channel: {channel_title}\n\
             ID: {channel_id}\n\n\
             I'll start monitoring posts in this channel."
        );
        self.replier.reply(chat_id, &text).await
    }
}

/// New and edited channel posts both feed the ingestion queue.
pub struct PostHandler {
    ingestor: Ingestor,
}

#[async_trait]
impl EventHandler for PostHandler {
    async fn handle(&self, event: BotEvent) -> Result<()> {
        let (BotEvent::ChannelPost(post) | BotEvent::EditedChannelPost(post)) = event else {
            return Ok(());
        };

        let (channel_id, message_id) = (post.channel_id, post.message_id);
        let ingestor = self.ingestor.clone();
        let outcome = blocking(move || ingestor.ingest(&post)).await?;
        debug!(
            channel_id,
            message_id,
            ?outcome,
            "channel post processed"
        );
        Ok(())
    }
}
