//! Runtime configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use garagebook_invoicing::{DEFAULT_TAX_PCT, Rates};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://garagebook.db";

/// Which store backs the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    InMemory,
    Sqlite(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub default_tax_pct: f64,
    pub seed_demo: bool,
}

impl AppConfig {
    /// Reads `GARAGEBOOK_BIND`, `DATABASE_URL`, `GARAGEBOOK_DEFAULT_TAX_PCT` and
    /// `GARAGEBOOK_SEED_DEMO`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind = var("GARAGEBOOK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "GARAGEBOOK_BIND",
            expected: "a socket address such as 0.0.0.0:8080",
            value: bind.clone(),
        })?;

        let database = match var("DATABASE_URL") {
            Some(url) if url.trim().eq_ignore_ascii_case("memory") => DatabaseConfig::InMemory,
            Some(url) => DatabaseConfig::Sqlite(url.trim().to_string()),
            None => DatabaseConfig::Sqlite(DEFAULT_DATABASE_URL.to_string()),
        };

        let default_tax_pct = match var("GARAGEBOOK_DEFAULT_TAX_PCT") {
            None => DEFAULT_TAX_PCT,
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|pct| pct.is_finite() && *pct >= 0.0)
                .ok_or(ConfigError::Invalid {
                    name: "GARAGEBOOK_DEFAULT_TAX_PCT",
                    expected: "a non-negative number",
                    value: raw,
                })?,
        };

        let seed_demo = match var("GARAGEBOOK_SEED_DEMO") {
            None => false,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "GARAGEBOOK_SEED_DEMO",
                        expected: "true or false",
                        value: raw,
                    });
                }
            },
        };

        Ok(Self {
            bind_addr,
            database,
            default_tax_pct,
            seed_demo,
        })
    }

    pub fn default_rates(&self) -> Rates {
        Rates {
            discount_pct: 0.0,
            tax_pct: self.default_tax_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.database, DatabaseConfig::Sqlite(DEFAULT_DATABASE_URL.into()));
        assert_eq!(cfg.default_tax_pct, 21.0);
        assert!(!cfg.seed_demo);
    }

    #[test]
    fn memory_selects_the_in_memory_store() {
        let cfg = config(&[("DATABASE_URL", "memory"), ("GARAGEBOOK_SEED_DEMO", "true")]).unwrap();
        assert_eq!(cfg.database, DatabaseConfig::InMemory);
        assert!(cfg.seed_demo);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("GARAGEBOOK_DEFAULT_TAX_PCT", "-4")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GARAGEBOOK_DEFAULT_TAX_PCT",
                ..
            }
        ));
        assert!(config(&[("GARAGEBOOK_BIND", "not-an-address")]).is_err());
        assert!(config(&[("GARAGEBOOK_SEED_DEMO", "maybe")]).is_err());
    }
}
