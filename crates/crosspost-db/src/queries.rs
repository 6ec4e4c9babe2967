use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crosspost_types::models::{ChannelBinding, Post, PostStatus, SetupToken};

use crate::models::{ChannelRow, PostRow, TokenRow, encode_ts};
use crate::store::validate_owner_id;
use crate::{Database, Result, Store};

const POST_COLUMNS: &str = "post_id, channel_id, message_id, content, created_at, status";

impl Store for Database {
    // -- Setup tokens --

    fn save_token(&self, token: &str, owner_id: i64, issued_at: DateTime<Utc>) -> Result<()> {
        validate_owner_id(owner_id)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO temp_tokens (token, issued_at, owner_id) VALUES (?1, ?2, ?3)",
                params![token, encode_ts(issued_at), owner_id],
            )?;
            Ok(())
        })?;
        debug!(owner_id, token = token_prefix(token), "setup token saved");
        Ok(())
    }

    fn get_token(&self, token: &str) -> Result<Option<SetupToken>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, issued_at, owner_id FROM temp_tokens WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(TokenRow {
                            token: row.get(0)?,
                            issued_at: row.get(1)?,
                            owner_id: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(SetupToken::try_from).transpose()
    }

    fn delete_token(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM temp_tokens WHERE token = ?1", [token])?;
            Ok(())
        })
    }

    fn take_token(&self, token: &str) -> Result<Option<SetupToken>> {
        // One statement under the connection lock: the row is gone by the
        // time any other caller can look for it.
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "DELETE FROM temp_tokens WHERE token = ?1
                     RETURNING token, issued_at, owner_id",
                    [token],
                    |row| {
                        Ok(TokenRow {
                            token: row.get(0)?,
                            issued_at: row.get(1)?,
                            owner_id: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(SetupToken::try_from).transpose()
    }

    fn cleanup_expired_tokens(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = encode_ts(now - ttl);
        let removed = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM temp_tokens WHERE issued_at < ?1", [cutoff])?)
        })?;
        if removed > 0 {
            info!(removed, "expired setup tokens removed");
        }
        Ok(removed)
    }

    // -- Account bindings --

    fn save_account_binding(
        &self,
        telegram_user_id: i64,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_owner_id(owner_id)?;
        // REPLACE clears rows conflicting on either the Telegram id or the owner.
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO telegram_bindings (telegram_user_id, owner_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![telegram_user_id, owner_id, encode_ts(now)],
            )?;
            Ok(())
        })?;
        info!(telegram_user_id, owner_id, "telegram account bound");
        Ok(())
    }

    fn get_owner_by_telegram_id(&self, telegram_user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT owner_id FROM telegram_bindings WHERE telegram_user_id = ?1",
                    [telegram_user_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn get_telegram_id_by_owner(&self, owner_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT telegram_user_id FROM telegram_bindings WHERE owner_id = ?1",
                    [owner_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn remove_account_binding(&self, owner_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM telegram_bindings WHERE owner_id = ?1", [owner_id])?;
            Ok(())
        })?;
        info!(owner_id, "telegram account binding removed");
        Ok(())
    }

    fn remove_all_bindings(&self, owner_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM telegram_bindings WHERE owner_id = ?1", [owner_id])?;
            tx.execute("DELETE FROM telegram_channels WHERE owner_id = ?1", [owner_id])?;
            tx.commit()?;
            Ok(())
        })?;
        info!(owner_id, "all telegram bindings removed");
        Ok(())
    }

    // -- Channel bindings --

    fn save_channel_binding(
        &self,
        owner_id: i64,
        channel_id: i64,
        channel_title: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_owner_id(owner_id)?;
        // Update in place rather than REPLACE so channel_settings rows survive.
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO telegram_channels (channel_id, owner_id, channel_title, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(channel_id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    channel_title = excluded.channel_title,
                    created_at = excluded.created_at",
                params![channel_id, owner_id, channel_title, encode_ts(now)],
            )?;
            Ok(())
        })?;
        info!(owner_id, channel_id, "channel binding saved");
        Ok(())
    }

    fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelBinding>> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT channel_id, owner_id, channel_title, created_at
                     FROM telegram_channels WHERE channel_id = ?1",
                    [channel_id],
                    map_channel_row,
                )
                .optional()?)
        })?;

        row.map(ChannelBinding::try_from).transpose()
    }

    fn list_channels(&self, owner_id: i64) -> Result<Vec<ChannelBinding>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, owner_id, channel_title, created_at
                 FROM telegram_channels WHERE owner_id = ?1
                 ORDER BY created_at, channel_id",
            )?;
            let rows = stmt
                .query_map([owner_id], map_channel_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(ChannelBinding::try_from).collect()
    }

    fn remove_channel_binding(&self, owner_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM telegram_channels WHERE owner_id = ?1", [owner_id])?;
            Ok(())
        })?;
        info!(owner_id, "channel bindings removed");
        Ok(())
    }

    fn has_channel(&self, owner_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM telegram_channels WHERE owner_id = ?1)",
                [owner_id],
                |row| row.get(0),
            )?)
        })
    }

    fn list_channel_ids(&self) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT channel_id FROM telegram_channels")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Posts --

    fn save_post(
        &self,
        channel_id: i64,
        message_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let inserted = self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO posts (channel_id, message_id, content, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    channel_id,
                    message_id,
                    content,
                    encode_ts(now),
                    PostStatus::Pending.as_str()
                ],
            )?;
            Ok(changed == 1)
        })?;

        if inserted {
            info!(channel_id, message_id, "new post saved");
        } else {
            debug!(channel_id, message_id, "post already exists");
        }
        Ok(inserted)
    }

    fn posts_for_channel(&self, channel_id: i64) -> Result<Vec<Post>> {
        let rows = self.with_conn(|conn| {
            query_posts(
                conn,
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE channel_id = ?1 ORDER BY post_id"),
                params![channel_id],
            )
        })?;

        rows.into_iter().map(Post::try_from).collect()
    }

    fn pending_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self.with_conn(|conn| {
            query_posts(
                conn,
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE status = ?1 ORDER BY post_id LIMIT ?2"
                ),
                params![PostStatus::Pending.as_str(), limit],
            )
        })?;

        rows.into_iter().map(Post::try_from).collect()
    }

    fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = ?1 WHERE post_id = ?2",
                params![status.as_str(), post_id],
            )?;
            Ok(changed == 1)
        })
    }
}

fn map_channel_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        channel_id: row.get(0)?,
        owner_id: row.get(1)?,
        channel_title: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_posts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(PostRow {
                post_id: row.get(0)?,
                channel_id: row.get(1)?,
                message_id: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
                status: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Tokens are credentials; logs only ever see the first few characters.
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(8) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
