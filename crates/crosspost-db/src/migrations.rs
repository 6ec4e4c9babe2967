use rusqlite::Connection;
use tracing::info;

use crate::Result;

// Timestamps are fixed-width RFC 3339 strings (microseconds, `Z` suffix),
// so string comparison in SQL orders them chronologically.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS temp_tokens (
            token       TEXT PRIMARY KEY,
            issued_at   TEXT NOT NULL,
            owner_id    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_temp_tokens_issued
            ON temp_tokens(issued_at);

        CREATE TABLE IF NOT EXISTS telegram_bindings (
            telegram_user_id    INTEGER PRIMARY KEY,
            owner_id            INTEGER NOT NULL UNIQUE,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS telegram_channels (
            channel_id      INTEGER PRIMARY KEY,
            owner_id        INTEGER NOT NULL,
            channel_title   TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_telegram_channels_owner
            ON telegram_channels(owner_id);

        -- Posts outlive their channel binding, so no foreign key here.
        CREATE TABLE IF NOT EXISTS posts (
            post_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id  INTEGER NOT NULL,
            message_id  INTEGER NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending',
            UNIQUE(channel_id, message_id)
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status
            ON posts(status, post_id);

        -- Reserved for auto-posting configuration; nothing reads it yet.
        CREATE TABLE IF NOT EXISTS channel_settings (
            channel_id          INTEGER PRIMARY KEY
                                REFERENCES telegram_channels(channel_id) ON DELETE CASCADE,
            auto_posting        INTEGER NOT NULL DEFAULT 0,
            post_interval       INTEGER DEFAULT 3600,
            created_at          TEXT NOT NULL,
            last_updated_at     TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
