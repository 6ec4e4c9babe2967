//! Database row types. Timestamps and status stay as raw strings here and are
//! parsed when converting into the `crosspost-types` models.
use chrono::{DateTime, SecondsFormat, Utc};

use crosspost_types::models::{ChannelBinding, Post, PostStatus, SetupToken};

use crate::{Result, StoreError};

pub struct TokenRow {
    pub token: String,
    pub issued_at: String,
    pub owner_id: i64,
}

pub struct ChannelRow {
    pub channel_id: i64,
    pub owner_id: i64,
    pub channel_title: String,
    pub created_at: String,
}

pub struct PostRow {
    pub post_id: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub content: String,
    pub created_at: String,
    pub status: String,
}

pub fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

impl TryFrom<TokenRow> for SetupToken {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self> {
        Ok(SetupToken {
            issued_at: decode_ts(&row.issued_at)?,
            token: row.token,
            owner_id: row.owner_id,
        })
    }
}

impl TryFrom<ChannelRow> for ChannelBinding {
    type Error = StoreError;

    fn try_from(row: ChannelRow) -> Result<Self> {
        Ok(ChannelBinding {
            created_at: decode_ts(&row.created_at)?,
            channel_id: row.channel_id,
            owner_id: row.owner_id,
            channel_title: row.channel_title,
        })
    }
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self> {
        let status: PostStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("post {}: {e}", row.post_id)))?;

        Ok(Post {
            created_at: decode_ts(&row.created_at)?,
            id: row.post_id,
            channel_id: row.channel_id,
            message_id: row.message_id,
            content: row.content,
            status,
        })
    }
}
