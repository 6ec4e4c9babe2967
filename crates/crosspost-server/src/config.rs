use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub bot_username: String,
    pub bot_token: Option<String>,
    pub cors_origins: Vec<String>,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = jwt_secret(lookup("CROSSPOST_JWT_SECRET"))?;

        let host = var("CROSSPOST_HOST", "0.0.0.0");
        let port: u16 = var("CROSSPOST_PORT", "8000")
            .parse()
            .context("CROSSPOST_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let sweep_interval_secs: u64 = var("CROSSPOST_SWEEP_INTERVAL_SECS", "60")
            .parse()
            .context("CROSSPOST_SWEEP_INTERVAL_SECS must be a whole number of seconds")?;
        if sweep_interval_secs == 0 {
            bail!("CROSSPOST_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        let cors_origins = var("CROSSPOST_CORS_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            addr,
            db_path: var("CROSSPOST_DB_PATH", "db/app.db").into(),
            jwt_secret,
            bot_username: var("CROSSPOST_BOT_USERNAME", "feedsAIbot"),
            bot_token: lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.trim().is_empty()),
            cors_origins,
            sweep_interval_secs,
        })
    }
}

fn jwt_secret(value: Option<String>) -> anyhow::Result<String> {
    let secret = value.unwrap_or_default();
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
        bail!(
            "CROSSPOST_JWT_SECRET is unset or still a placeholder. \
             Set it in your .env file and restart."
        );
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("CROSSPOST_JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.db_path, PathBuf::from("db/app.db"));
        assert_eq!(config.bot_username, "feedsAIbot");
        assert_eq!(config.bot_token, None);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "http://127.0.0.1:3000"]
        );
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn overrides_apply() {
        let config = load(&[
            ("CROSSPOST_JWT_SECRET", "s3cret"),
            ("CROSSPOST_HOST", "127.0.0.1"),
            ("CROSSPOST_PORT", "9100"),
            ("CROSSPOST_DB_PATH", "/tmp/x.db"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("CROSSPOST_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(load(&[]).is_err());
        assert!(load(&[("CROSSPOST_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_are_fatal() {
        assert!(load(&[("CROSSPOST_JWT_SECRET", "s"), ("CROSSPOST_PORT", "http")]).is_err());
        assert!(
            load(&[
                ("CROSSPOST_JWT_SECRET", "s"),
                ("CROSSPOST_SWEEP_INTERVAL_SECS", "0")
            ])
            .is_err()
        );
    }
}
