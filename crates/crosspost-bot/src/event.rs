use teloxide::types::{Message, MessageOrigin, Update, UpdateKind};

use crosspost_core::ChannelPost;

/// Bot updates the service cares about, stripped of Telegram wire types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// `/start` or `/start <token>` in a private chat.
    Start {
        chat_id: i64,
        telegram_user_id: i64,
        token: Option<String>,
    },
    /// A user forwarded a channel message to the bot to claim that channel.
    ForwardedFromChannel {
        chat_id: i64,
        telegram_user_id: i64,
        channel_id: i64,
        channel_title: String,
    },
    ChannelPost(ChannelPost),
    EditedChannelPost(ChannelPost),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    ForwardedFromChannel,
    ChannelPost,
    EditedChannelPost,
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::ForwardedFromChannel { .. } => EventKind::ForwardedFromChannel,
            Self::ChannelPost(_) => EventKind::ChannelPost,
            Self::EditedChannelPost(_) => EventKind::EditedChannelPost,
        }
    }

    /// `None` for updates nobody handles.
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) => from_private_message(msg),
            UpdateKind::ChannelPost(msg) => Some(Self::ChannelPost(channel_post(msg))),
            UpdateKind::EditedChannelPost(msg) => Some(Self::EditedChannelPost(channel_post(msg))),
            _ => None,
        }
    }
}

fn channel_post(msg: &Message) -> ChannelPost {
    ChannelPost {
        channel_id: msg.chat.id.0,
        message_id: i64::from(msg.id.0),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
    }
}

fn from_private_message(msg: &Message) -> Option<BotEvent> {
    let from = msg.from.as_ref()?;
    let telegram_user_id = i64::try_from(from.id.0).ok()?;
    let chat_id = msg.chat.id.0;

    if let Some(MessageOrigin::Channel { chat, .. }) = msg.forward_origin() {
        return Some(BotEvent::ForwardedFromChannel {
            chat_id,
            telegram_user_id,
            channel_id: chat.id.0,
            channel_title: chat.title().unwrap_or_default().to_string(),
        });
    }

    let token = parse_start_command(msg.text()?)?;
    Some(BotEvent::Start {
        chat_id,
        telegram_user_id,
        token,
    })
}

/// `Some(arg)` when `text` is a `/start` command (optionally addressed as
/// `/start@botname`), where `arg` is the deep-link payload if any.
pub fn parse_start_command(text: &str) -> Option<Option<String>> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    let name = command.split('@').next()?;
    if name != "/start" {
        return None;
    }
    Some(parts.next().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_without_payload() {
        assert_eq!(parse_start_command("/start"), Some(None));
        assert_eq!(parse_start_command("  /start  "), Some(None));
    }

    #[test]
    fn start_with_payload() {
        assert_eq!(
            parse_start_command("/start AbC-123_x"),
            Some(Some("AbC-123_x".into()))
        );
        assert_eq!(
            parse_start_command("/start@feedsAIbot tok"),
            Some(Some("tok".into()))
        );
    }

    #[test]
    fn other_text_is_not_start() {
        assert_eq!(parse_start_command("hello"), None);
        assert_eq!(parse_start_command("/starter"), None);
        assert_eq!(parse_start_command("/getid"), None);
        assert_eq!(parse_start_command(""), None);
    }

    #[test]
    fn kinds_follow_variants() {
        let post = ChannelPost {
            channel_id: 1,
            message_id: 1,
            text: None,
            caption: None,
        };
        assert_eq!(BotEvent::ChannelPost(post.clone()).kind(), EventKind::ChannelPost);
        assert_eq!(BotEvent::EditedChannelPost(post).kind(), EventKind::EditedChannelPost);
        assert_eq!(
            BotEvent::Start {
                chat_id: 1,
                telegram_user_id: 1,
                token: None
            }
            .kind(),
            EventKind::Start
        );
    }
}
