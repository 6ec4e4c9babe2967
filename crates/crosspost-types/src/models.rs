use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A one-time credential handed to the web client and redeemed through the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupToken {
    pub token: String,
    pub owner_id: i64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel_id: i64,
    pub owner_id: i64,
    pub channel_title: String,
    pub created_at: DateTime<Utc>,
}

/// A channel message queued for downstream processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: PostStatus,
}

/// Ingestion only ever writes `Pending`; the other states belong to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Processing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPostStatus(pub String);

impl fmt::Display for UnknownPostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown post status: {}", self.0)
    }
}

impl std::error::Error for UnknownPostStatus {}

impl FromStr for PostStatus {
    type Err = UnknownPostStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownPostStatus(other.to_string())),
        }
    }
}
