//! Process-local `Store` for tests. Mirrors the SQLite semantics exactly; it
//! is never wired into the server binary.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crosspost_types::models::{ChannelBinding, Post, PostStatus, SetupToken};

use crate::store::validate_owner_id;
use crate::{Result, Store, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, SetupToken>,
    /// telegram_user_id -> (owner_id, created_at)
    accounts: HashMap<i64, (i64, DateTime<Utc>)>,
    channels: HashMap<i64, ChannelBinding>,
    posts: Vec<Post>,
    next_post_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Store for MemoryStore {
    fn save_token(&self, token: &str, owner_id: i64, issued_at: DateTime<Utc>) -> Result<()> {
        validate_owner_id(owner_id)?;
        let mut inner = self.lock()?;
        if inner.tokens.contains_key(token) {
            return Err(StoreError::Corrupt(format!("duplicate setup token {token}")));
        }
        inner.tokens.insert(
            token.to_string(),
            SetupToken {
                token: token.to_string(),
                owner_id,
                issued_at,
            },
        );
        Ok(())
    }

    fn get_token(&self, token: &str) -> Result<Option<SetupToken>> {
        Ok(self.lock()?.tokens.get(token).cloned())
    }

    fn delete_token(&self, token: &str) -> Result<()> {
        self.lock()?.tokens.remove(token);
        Ok(())
    }

    fn take_token(&self, token: &str) -> Result<Option<SetupToken>> {
        Ok(self.lock()?.tokens.remove(token))
    }

    fn cleanup_expired_tokens(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - ttl;
        let mut inner = self.lock()?;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| t.issued_at >= cutoff);
        Ok(before - inner.tokens.len())
    }

    fn save_account_binding(
        &self,
        telegram_user_id: i64,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_owner_id(owner_id)?;
        let mut inner = self.lock()?;
        inner.accounts.retain(|_, (owner, _)| *owner != owner_id);
        inner.accounts.insert(telegram_user_id, (owner_id, now));
        Ok(())
    }

    fn get_owner_by_telegram_id(&self, telegram_user_id: i64) -> Result<Option<i64>> {
        Ok(self
            .lock()?
            .accounts
            .get(&telegram_user_id)
            .map(|(owner, _)| *owner))
    }

    fn get_telegram_id_by_owner(&self, owner_id: i64) -> Result<Option<i64>> {
        Ok(self
            .lock()?
            .accounts
            .iter()
            .find(|(_, (owner, _))| *owner == owner_id)
            .map(|(tg, _)| *tg))
    }

    fn remove_account_binding(&self, owner_id: i64) -> Result<()> {
        self.lock()?
            .accounts
            .retain(|_, (owner, _)| *owner != owner_id);
        Ok(())
    }

    fn remove_all_bindings(&self, owner_id: i64) -> Result<()> {
        let mut inner = self.lock()?;
        inner.accounts.retain(|_, (owner, _)| *owner != owner_id);
        inner.channels.retain(|_, c| c.owner_id != owner_id);
        Ok(())
    }

    fn save_channel_binding(
        &self,
        owner_id: i64,
        channel_id: i64,
        channel_title: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_owner_id(owner_id)?;
        self.lock()?.channels.insert(
            channel_id,
            ChannelBinding {
                channel_id,
                owner_id,
                channel_title: channel_title.to_string(),
                created_at: now,
            },
        );
        Ok(())
    }

    fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelBinding>> {
        Ok(self.lock()?.channels.get(&channel_id).cloned())
    }

    fn list_channels(&self, owner_id: i64) -> Result<Vec<ChannelBinding>> {
        let mut channels: Vec<_> = self
            .lock()?
            .channels
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| (c.created_at, c.channel_id));
        Ok(channels)
    }

    fn remove_channel_binding(&self, owner_id: i64) -> Result<()> {
        self.lock()?.channels.retain(|_, c| c.owner_id != owner_id);
        Ok(())
    }

    fn has_channel(&self, owner_id: i64) -> Result<bool> {
        Ok(self
            .lock()?
            .channels
            .values()
            .any(|c| c.owner_id == owner_id))
    }

    fn list_channel_ids(&self) -> Result<Vec<i64>> {
        Ok(self.lock()?.channels.keys().copied().collect())
    }

    fn save_post(
        &self,
        channel_id: i64,
        message_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner
            .posts
            .iter()
            .any(|p| p.channel_id == channel_id && p.message_id == message_id)
        {
            return Ok(false);
        }

        inner.next_post_id += 1;
        let id = inner.next_post_id;
        inner.posts.push(Post {
            id,
            channel_id,
            message_id,
            content: content.to_string(),
            created_at: now,
            status: PostStatus::Pending,
        });
        Ok(true)
    }

    fn posts_for_channel(&self, channel_id: i64) -> Result<Vec<Post>> {
        Ok(self
            .lock()?
            .posts
            .iter()
            .filter(|p| p.channel_id == channel_id)
            .cloned()
            .collect())
    }

    fn pending_posts(&self, limit: usize) -> Result<Vec<Post>> {
        Ok(self
            .lock()?
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.posts.iter_mut().find(|p| p.id == post_id) {
            Some(post) => {
                post.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
