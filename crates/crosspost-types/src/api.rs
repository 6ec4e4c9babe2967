use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Session --

/// Session JWT claims. `sub` is the owner the caller acts for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

// -- Linking --

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SetupResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
    pub telegram_user_id: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_user_id: Option<i64>,
}

// -- Channels --

/// Extra fields sent by the bot/web client are ignored.
#[derive(Debug, Deserialize)]
pub struct LinkChannelRequest {
    pub telegram_user_id: i64,
    pub channel_id: i64,
    pub channel_title: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChannelCheckResponse {
    #[serde(rename = "hasChannel")]
    pub has_channel: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_id: i64,
    pub channel_title: String,
    pub created_at: DateTime<Utc>,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
