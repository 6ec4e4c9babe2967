use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{debug, info, warn};

use crosspost_db::{Store, token_prefix};

use crate::{Clock, Error, Result};

/// Lifetime of a setup token. Both the sweep and the per-call check use it.
pub const TOKEN_TTL_SECS: i64 = 600;

const TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The owner already has a Telegram account bound.
    Connected { telegram_user_id: i64 },
    /// A fresh token was issued; the user opens `bot_url` to redeem it.
    Pending { token: String, bot_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub telegram_user_id: Option<i64>,
}

impl ConnectionStatus {
    fn disconnected() -> Self {
        Self::default()
    }
}

/// Token handshake binding an owner to a Telegram identity.
///
/// Per owner: unlinked, then a token is issued by [`Linker::request_setup`],
/// then [`Linker::verify`] consumes it exactly once and records the binding.
#[derive(Clone)]
pub struct Linker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    bot_username: String,
    ttl: Duration,
}

impl Linker {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, bot_username: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            bot_username: bot_username.into(),
            ttl: Duration::seconds(TOKEN_TTL_SECS),
        }
    }

    pub fn request_setup(&self, owner_id: i64) -> Result<SetupOutcome> {
        if let Some(telegram_user_id) = self.store.get_telegram_id_by_owner(owner_id)? {
            debug!(owner_id, telegram_user_id, "owner already linked");
            return Ok(SetupOutcome::Connected { telegram_user_id });
        }

        let token = generate_token();
        self.store.save_token(&token, owner_id, self.clock.now())?;
        info!(owner_id, token = token_prefix(&token), "setup token issued");

        Ok(SetupOutcome::Pending {
            bot_url: self.bot_url(&token),
            token,
        })
    }

    /// Redeem `token` for `telegram_user_id`. Returns the owner now bound.
    ///
    /// The token is claimed before anything else, so of two concurrent
    /// redemptions only one can see it. An expired token is consumed too.
    pub fn verify(&self, token: &str, telegram_user_id: i64) -> Result<i64> {
        let now = self.clock.now();
        let claimed = self.store.take_token(token)?;
        self.store.cleanup_expired_tokens(self.ttl, now)?;

        let setup = claimed.ok_or_else(|| {
            warn!(token = token_prefix(token), "verify with unknown token");
            Error::InvalidToken
        })?;

        if self.is_expired(setup.issued_at, now) {
            warn!(token = token_prefix(token), "verify with expired token");
            return Err(Error::TokenExpired);
        }

        self.store
            .save_account_binding(telegram_user_id, setup.owner_id, now)?;

        info!(
            owner_id = setup.owner_id,
            telegram_user_id, "telegram account linked"
        );
        Ok(setup.owner_id)
    }

    /// Status as seen by a client holding `token`. Once the token is gone the
    /// answer comes from the permanent binding of `owner_id`, when known.
    pub fn check_connection(&self, token: &str, owner_id: Option<i64>) -> Result<ConnectionStatus> {
        if let Some(setup) = self.store.get_token(token)? {
            if self.is_expired(setup.issued_at, self.clock.now()) {
                self.store.delete_token(token)?;
                return Ok(ConnectionStatus::disconnected());
            }
            return Ok(ConnectionStatus {
                connected: true,
                telegram_user_id: None,
            });
        }

        match owner_id {
            Some(owner_id) => self.connection_for_owner(owner_id),
            None => Ok(ConnectionStatus::disconnected()),
        }
    }

    pub fn connection_for_owner(&self, owner_id: i64) -> Result<ConnectionStatus> {
        let telegram_user_id = self.store.get_telegram_id_by_owner(owner_id)?;
        Ok(ConnectionStatus {
            connected: telegram_user_id.is_some(),
            telegram_user_id,
        })
    }

    pub fn disconnect(&self, owner_id: i64) -> Result<()> {
        self.store.remove_account_binding(owner_id)?;
        Ok(())
    }

    pub fn disconnect_all(&self, owner_id: i64) -> Result<()> {
        self.store.remove_all_bindings(owner_id)?;
        Ok(())
    }

    /// Drop every expired token. Run periodically so abandoned tokens don't pile up.
    pub fn sweep_expired(&self) -> Result<usize> {
        Ok(self
            .store
            .cleanup_expired_tokens(self.ttl, self.clock.now())?)
    }

    pub fn bot_url(&self, token: &str) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, token)
    }

    fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - issued_at > self.ttl
    }
}

/// 128 random bits, URL-safe so it can ride in a `?start=` deep link.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
