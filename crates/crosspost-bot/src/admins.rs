use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatId, UserId},
};

use crate::Result;

/// Answers "does this user administer that chat?" against Telegram.
#[async_trait]
pub trait ChatAdmins: Send + Sync {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> Result<bool>;
}

#[async_trait]
impl ChatAdmins for Bot {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let member = self.get_chat_member(ChatId(chat_id), UserId(user_id)).await?;
        Ok(member.kind.is_privileged())
    }
}
