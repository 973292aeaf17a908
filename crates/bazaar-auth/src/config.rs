use anyhow::{Result, bail};
use tracing::warn;

pub const DEFAULT_SECRET: &str = "change_this_secret_in_prod";

/// Immutable process-wide configuration. Constructed once at startup and
/// passed into each component; nothing reads the environment afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            secret_key: std::env::var("SECRET_KEY").unwrap_or_else(|_| DEFAULT_SECRET.into()),
            algorithm: std::env::var("ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            access_token_expire_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|_| "10080".into())
                .parse()?,
            refresh_token_expire_days: std::env::var("REFRESH_TOKEN_EXPIRE_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// The default secret is a startup error in production and a warning
    /// everywhere else.
    pub fn validate(&self) -> Result<()> {
        if self.secret_key == DEFAULT_SECRET {
            if self.is_production() {
                bail!("SECRET_KEY is still the default value; set a real secret");
            }
            warn!("SECRET_KEY is the default value; fine for development only");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Whether 500 bodies may carry error detail.
    pub fn expose_errors(&self) -> bool {
        !self.is_production()
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expire_minutes)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expire_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, environment: &str) -> Config {
        Config {
            secret_key: secret.into(),
            algorithm: "HS256".into(),
            access_token_expire_minutes: 10080,
            refresh_token_expire_days: 30,
            environment: environment.into(),
        }
    }

    #[test]
    fn default_secret_rejected_in_production() {
        assert!(config(DEFAULT_SECRET, "production").validate().is_err());
        assert!(config(DEFAULT_SECRET, "prod").validate().is_err());
        assert!(config(DEFAULT_SECRET, "development").validate().is_ok());
        assert!(config("a-real-secret", "production").validate().is_ok());
    }

    #[test]
    fn error_detail_exposed_outside_production_only() {
        assert!(config("s", "development").expose_errors());
        assert!(config("s", "staging").expose_errors());
        assert!(!config("s", "production").expose_errors());
    }
}
