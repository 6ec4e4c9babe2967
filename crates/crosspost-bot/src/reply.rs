use async_trait::async_trait;
use teloxide::{prelude::*, types::ChatId};

use crate::Result;

#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[async_trait]
impl Replier for Bot {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }
}
