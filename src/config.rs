use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// One year.
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;
/// One week.
pub const MAX_MATCHER_INTERVAL_MINUTES: u64 = 60 * 24 * 7;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// Where users and subscriptions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Verified SES sender. Without one, outgoing mail is only logged.
    pub source_email: Option<String>,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub db_max_connections: u32,
    pub store_timeout_ms: u64,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub matcher_interval_minutes: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres store backend");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24),
        };

        let mail = MailConfig {
            source_email: std::env::var("MAIL_SOURCE_EMAIL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        let config = Self {
            database_url,
            store_backend,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS").unwrap_or(5_000),
            jwt,
            mail,
            matcher_interval_minutes: env_parse("MATCHER_INTERVAL_MINUTES").filter(|m| *m > 0),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_JWT_TTL_MINUTES).contains(&self.jwt.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_JWT_TTL_MINUTES}, got {}",
                self.jwt.ttl_minutes
            );
        }
        if let Some(m) = self.matcher_interval_minutes {
            if m > MAX_MATCHER_INTERVAL_MINUTES {
                anyhow::bail!(
                    "MATCHER_INTERVAL_MINUTES must be at most {MAX_MATCHER_INTERVAL_MINUTES}, got {m}"
                );
            }
        }
        Ok(())
    }

    pub fn matcher_interval(&self) -> Option<Duration> {
        self.matcher_interval_minutes
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Settings used by unit tests: in-memory store, log mailer, fixed secret.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            store_backend: StoreBackend::Memory,
            db_max_connections: 1,
            store_timeout_ms: 1_000,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl_minutes: 60 * 24,
            },
            mail: MailConfig {
                source_email: None,
                region: "us-east-1".into(),
            },
            matcher_interval_minutes: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_tests_are_valid() {
        let config = AppConfig::for_tests();
        assert!(config.validate().is_ok());
        assert_eq!(config.matcher_interval(), None);
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        let mut config = AppConfig::for_tests();
        config.jwt.ttl_minutes = i64::MAX;
        assert!(config.validate().is_err());
        config.jwt.ttl_minutes = 0;
        assert!(config.validate().is_err());
        config.jwt.ttl_minutes = MAX_JWT_TTL_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn huge_matcher_interval_is_rejected_not_overflowed() {
        let mut config = AppConfig::for_tests();
        config.matcher_interval_minutes = Some(u64::MAX);
        assert!(config.validate().is_err());
        assert_eq!(config.matcher_interval(), None);

        config.matcher_interval_minutes = Some(15);
        assert!(config.validate().is_ok());
        assert_eq!(config.matcher_interval(), Some(Duration::from_secs(900)));
    }
}
