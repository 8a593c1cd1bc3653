use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capabilities::{HostPolicy, HttpError, ValidatedUrl, MAX_TIMEOUT_MS};

pub const ENV_API_BASE_URL: &str = "VILLA_API_BASE_URL";
pub const ENV_LOGIN_ROUTE: &str = "VILLA_LOGIN_ROUTE";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "VILLA_REQUEST_TIMEOUT_MS";
pub const ENV_ALLOW_PRIVATE_HOSTS: &str = "VILLA_ALLOW_PRIVATE_HOSTS";
pub const ENV_ROLLBACK_POLICY: &str = "VILLA_ROLLBACK_POLICY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("invalid API base URL: {0}")]
    BaseUrl(#[from] HttpError),

    #[error("malformed config document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How a failed mutation is undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Restore only the item that was mutated. Concurrent speculative changes
    /// to other items survive.
    #[default]
    PerItem,
    /// Restore the whole list as it was when the mutation started.
    FullSnapshot,
}

impl std::str::FromStr for RollbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_item" | "per-item" => Ok(Self::PerItem),
            "full_snapshot" | "full-snapshot" => Ok(Self::FullSnapshot),
            other => Err(format!("unknown rollback policy '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub login_route: String,
    pub request_timeout_ms: u64,
    pub allow_private_hosts: bool,
    pub rollback_policy: RollbackPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            login_route: "/login".into(),
            request_timeout_ms: 30_000,
            allow_private_hosts: true,
            rollback_policy: RollbackPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by `VILLA_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(route) = lookup(ENV_LOGIN_ROUTE) {
            config.login_route = route;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout_ms =
                raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidValue {
                        key: ENV_REQUEST_TIMEOUT_MS,
                        reason: e.to_string(),
                    }
                })?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_PRIVATE_HOSTS) {
            config.allow_private_hosts = parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: ENV_ALLOW_PRIVATE_HOSTS,
                    reason: format!("expected a boolean, got '{raw}'"),
                }
            })?;
        }
        if let Some(raw) = lookup(ENV_ROLLBACK_POLICY) {
            config.rollback_policy = raw
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: ENV_ROLLBACK_POLICY,
                    reason,
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ValidatedUrl::with_policy(self.api_base_url.as_str(), self.host_policy())?;

        if !self.login_route.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "login_route",
                reason: "must be an absolute path".into(),
            });
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms",
                reason: format!("must be between 1 and {MAX_TIMEOUT_MS}"),
            });
        }
        Ok(())
    }

    pub fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }

    /// Absolute URL for an API path such as `/villas/bookings/`.
    pub fn endpoint_url(&self, path: &str) -> Result<ValidatedUrl, HttpError> {
        let base = self.api_base_url.trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        ValidatedUrl::with_policy(format!("{base}{path}"), self.host_policy())
    }

    pub fn endpoint_url_with_query(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ValidatedUrl, HttpError> {
        let url = self.endpoint_url(path)?;
        let mut parsed = Url::parse(url.as_str()).map_err(|e| HttpError::InvalidUrl {
            url: url.as_str().to_string(),
            reason: e.to_string(),
        })?;
        {
            let mut pairs = parsed.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        ValidatedUrl::with_policy(parsed.to_string(), self.host_policy())
    }

    /// Login route carrying the page to come back to after signing in.
    pub fn login_url(&self, next: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
        format!("{}?next={encoded}", self.login_route)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
