use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SITE_URL: &str = "https://meme-streak-hub.lovable.app";
pub const DEFAULT_JWT_SECRET: &str = "MEMESTREAK_SUPER_SECRET";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Supabase { url: String, key: String },
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub telegram_api_url: Option<String>,
    pub store: StoreConfig,
    pub jwt_secret: String,
    /// `JWT_SECRET` was unset and the built-in secret is in use.
    pub jwt_secret_is_default: bool,
    pub site_url: String,
    pub host: String,
    pub port: u16,
    pub broadcast_interval: Duration,
    pub broadcast_initial_delay: Duration,
    pub session_ttl: chrono::Duration,
    pub otp_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let telegram_token = require("TELEGRAM_BOT_TOKEN")?;

        let store = match get("MEMESTREAK_STORE").as_deref().unwrap_or("supabase") {
            "supabase" => StoreConfig::Supabase {
                url: require("SUPABASE_URL")?,
                key: require("SUPABASE_KEY")?,
            },
            "sqlite" => StoreConfig::Sqlite {
                path: PathBuf::from(
                    get("MEMESTREAK_DB_PATH").unwrap_or_else(|| "memestreak.db".into()),
                ),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "MEMESTREAK_STORE",
                    value: other.to_string(),
                    reason: "expected supabase or sqlite".into(),
                });
            }
        };

        let jwt_secret = get("JWT_SECRET");
        let jwt_secret_is_default = jwt_secret.is_none();

        let parse = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        key,
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                }),
            }
        };

        let port = parse("PORT", 3000)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::Invalid {
            key: "PORT",
            value: port.to_string(),
            reason: "out of range".into(),
        })?;

        let broadcast_hours = parse("BROADCAST_INTERVAL_HOURS", 48)?;
        if broadcast_hours == 0 {
            return Err(ConfigError::Invalid {
                key: "BROADCAST_INTERVAL_HOURS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let minutes = |key: &'static str, default: u64| -> Result<chrono::Duration, ConfigError> {
            let value = parse(key, default)?;
            i64::try_from(value)
                .ok()
                .and_then(chrono::Duration::try_minutes)
                .ok_or(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                    reason: "out of range".into(),
                })
        };

        Ok(Self {
            telegram_token,
            telegram_api_url: get("TELEGRAM_API_URL"),
            store,
            jwt_secret: jwt_secret.unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            jwt_secret_is_default,
            site_url: get("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            broadcast_interval: Duration::from_secs(broadcast_hours.saturating_mul(3600)),
            broadcast_initial_delay: Duration::from_secs(parse("BROADCAST_INITIAL_DELAY_SECS", 15)?),
            session_ttl: minutes("SESSION_TTL_MINS", 15)?,
            otp_ttl: minutes("OTP_TTL_MINS", 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const SUPABASE: [(&str, &str); 3] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("SUPABASE_URL", "https://proj.supabase.co"),
        ("SUPABASE_KEY", "service-key"),
    ];

    #[test]
    fn defaults_with_supabase() {
        let config = config(&SUPABASE).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Supabase {
                url: "https://proj.supabase.co".into(),
                key: "service-key".into()
            }
        );
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert!(config.jwt_secret_is_default);
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(config.broadcast_interval, Duration::from_secs(48 * 3600));
        assert_eq!(config.broadcast_initial_delay, Duration::from_secs(15));
        assert_eq!(config.session_ttl, chrono::Duration::minutes(15));
        assert_eq!(config.otp_ttl, chrono::Duration::minutes(10));
    }

    #[test]
    fn token_is_required() {
        let err = config(&SUPABASE[1..]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn supabase_needs_credentials_but_sqlite_does_not() {
        let err = config(&SUPABASE[..2]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SUPABASE_KEY"));

        let config = config(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("MEMESTREAK_STORE", "sqlite"),
            ("MEMESTREAK_DB_PATH", "/tmp/ms.db"),
        ])
        .unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Sqlite {
                path: PathBuf::from("/tmp/ms.db")
            }
        );
    }

    #[test]
    fn empty_values_count_as_missing() {
        let err = config(&[("TELEGRAM_BOT_TOKEN", "  "), ("MEMESTREAK_STORE", "sqlite")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = SUPABASE.to_vec();
        pairs.extend([
            ("JWT_SECRET", "hunter2"),
            ("PORT", "8080"),
            ("BROADCAST_INTERVAL_HOURS", "24"),
            ("OTP_TTL_MINS", "5"),
        ]);
        let config = config(&pairs).unwrap();
        assert_eq!(config.jwt_secret, "hunter2");
        assert!(!config.jwt_secret_is_default);
        assert_eq!(config.port, 8080);
        assert_eq!(config.broadcast_interval, Duration::from_secs(24 * 3600));
        assert_eq!(config.otp_ttl, chrono::Duration::minutes(5));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut pairs = SUPABASE.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            config(&pairs),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut pairs = SUPABASE.to_vec();
        pairs.push(("PORT", "70000"));
        assert!(matches!(
            config(&pairs),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut pairs = SUPABASE.to_vec();
        pairs.push(("BROADCAST_INTERVAL_HOURS", "0"));
        assert!(config(&pairs).is_err());

        let mut pairs = SUPABASE.to_vec();
        pairs.push(("MEMESTREAK_STORE", "postgres"));
        assert!(matches!(
            config(&pairs),
            Err(ConfigError::Invalid { key: "MEMESTREAK_STORE", .. })
        ));
    }
}
