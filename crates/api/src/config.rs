//! Environment-driven API configuration.

use std::net::SocketAddr;

use thiserror::Error;

use storefront_orders::TransitionPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// `Some(url)` selects the Postgres stores; `None` runs in-memory.
    pub database_url: Option<String>,
    pub transition_policy: TransitionPolicy,
    /// Page size for `GET /orders/latest` when no `limit` is given.
    pub latest_orders_default: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            transition_policy: TransitionPolicy::default(),
            latest_orders_default: 5,
        }
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    ///
    /// - `BIND_ADDR` (default `0.0.0.0:8080`)
    /// - `USE_PERSISTENT_STORES` + `DATABASE_URL`
    /// - `ORDER_TRANSITION_POLICY` (`permissive` | `strict`)
    /// - `LATEST_ORDERS_DEFAULT` (default 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ApiConfig::default();

        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                message: format!("{e}"),
            })?;
        }

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            Some(v) => v.trim().parse::<bool>().map_err(|_| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                message: format!("expected true or false, got '{v}'"),
            })?,
            None => false,
        };
        if persistent {
            let url = lookup("DATABASE_URL")
                .filter(|u| !u.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            config.database_url = Some(url);
        }

        if let Some(policy) = lookup("ORDER_TRANSITION_POLICY") {
            config.transition_policy = policy.parse().map_err(|e| ConfigError::Invalid {
                key: "ORDER_TRANSITION_POLICY",
                message: format!("{e}"),
            })?;
        }

        if let Some(n) = lookup("LATEST_ORDERS_DEFAULT") {
            config.latest_orders_default = n
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "LATEST_ORDERS_DEFAULT",
                    message: format!("expected a positive integer, got '{n}'"),
                })?;
        }

        Ok(config)
    }
}
