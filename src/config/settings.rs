//! Runtime settings from environment variables (`.env` is loaded by the binary via dotenvy).

use crate::error::ConfigError;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    /// Public URL prefix for stored media, e.g. `https://example.com/uploads`.
    pub media_base_url: String,
    pub allowed_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub upload_limit_bytes: usize,
    pub s3_bucket: Option<String>,
    pub s3_prefix: String,
    pub telegram: Option<TelegramSettings>,
    pub smtp: Option<SmtpSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/showcase".into(),
            max_connections: 5,
            bind_addr: "0.0.0.0:3000".into(),
            media_base_url: String::new(),
            allowed_origins: vec!["http://localhost:5173".into()],
            jwt_secret: String::new(),
            jwt_issuer: None,
            upload_limit_bytes: 10 * 1024 * 1024,
            s3_bucket: None,
            s3_prefix: "uploads".into(),
            telegram: None,
            smtp: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let d = Settings::default();

        // Required: HS256 with an empty key accepts tokens signed with an empty key.
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Invalid {
            key: "JWT_SECRET",
            value: String::new(),
        })?;

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        };
        let smtp = match (get("SMTP_HOST"), get("CONTACT_MAIL_TO")) {
            (Some(host), Some(to)) => Some(SmtpSettings {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                user: get("SMTP_USER").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                from: get("CONTACT_MAIL_FROM").unwrap_or_else(|| to.clone()),
                to,
            }),
            _ => None,
        };

        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or(d.database_url),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), d.max_connections)?,
            bind_addr: get("BIND_ADDR").unwrap_or(d.bind_addr),
            media_base_url: get("MEDIA_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(d.media_base_url),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(d.allowed_origins),
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER"),
            upload_limit_bytes: parse_or("UPLOAD_LIMIT_BYTES", get("UPLOAD_LIMIT_BYTES"), d.upload_limit_bytes)?,
            s3_bucket: get("S3_BUCKET"),
            s3_prefix: get("S3_PREFIX")
                .map(|s| s.trim_matches('/').to_string())
                .unwrap_or(d.s3_prefix),
            telegram,
            smtp,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}
