use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Config {
    /// Read configuration from the environment (a `.env` file, if present,
    /// has already been loaded by `main`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("PARLOR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLOR_JWT_SECRET is unset or still a placeholder");
        }

        let port = lookup("PARLOR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLOR_PORT must be a port number")?;

        let token_ttl_days = lookup("PARLOR_TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("PARLOR_TOKEN_TTL_DAYS must be a number of days")?;

        Ok(Self {
            host: lookup("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("PARLOR_DB_PATH").unwrap_or_else(|| "parlor.db".into()).into(),
            jwt_secret,
            token_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = config(&[("PARLOR_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("parlor.db"));
        assert_eq!(cfg.token_ttl_days, 30);
    }

    #[test]
    fn placeholder_or_missing_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("PARLOR_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = config(&[("PARLOR_JWT_SECRET", "s3cret"), ("PARLOR_PORT", "http")]);
        assert!(err.is_err());
    }
}
