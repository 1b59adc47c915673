//! Process configuration, read from the environment (and `.env` when present).

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Mailboxes the pipeline writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    /// Approver for purchase approvals.
    pub manager: String,
    /// Receives payment authorizations.
    pub finance: String,
    pub logistics: String,
    /// `from` address of every outbound message.
    pub sender: String,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            manager: "manager@company.com".to_string(),
            finance: "finance@company.com".to_string(),
            logistics: "logistics@company.com".to_string(),
            sender: "operations@company.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcuraConfig {
    /// Unset selects the in-memory store.
    pub database_url: Option<String>,
    pub channels: Channels,
    /// Unset selects the logging transport.
    pub mail_relay_url: Option<String>,
    /// Unset selects the template generator.
    pub ollama_url: Option<String>,
    pub ollama_model: String,
    /// Fall back to template prose when the configured generator fails.
    pub text_fallback: bool,
    pub max_concurrency: usize,
    pub collaborator_timeout: Duration,
    /// How long an RFQ stays PENDING before quote intake looks at it.
    pub quote_cooldown: Duration,
    /// ATTEMPTING intents older than this are flagged by reconciliation.
    pub intent_stale_after: Duration,
    pub listen_addr: SocketAddr,
    pub store_retry: RetryPolicy,
    pub text_retry: RetryPolicy,
    pub transport_retry: RetryPolicy,
}

impl Default for ProcuraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            channels: Channels::default(),
            mail_relay_url: None,
            ollama_url: None,
            ollama_model: "llama3".to_string(),
            text_fallback: true,
            max_concurrency: 4,
            collaborator_timeout: Duration::from_secs(30),
            quote_cooldown: Duration::from_secs(86_400),
            intent_stale_after: Duration::from_secs(3_600),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store_retry: RetryPolicy::default(),
            text_retry: RetryPolicy::default(),
            transport_retry: RetryPolicy::no_retry(),
        }
    }
}

impl ProcuraConfig {
    /// Load from the process environment after reading `.env` (if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let channels = Channels {
            manager: get("MANAGER_EMAIL").unwrap_or(defaults.channels.manager),
            finance: get("FINANCE_EMAIL").unwrap_or(defaults.channels.finance),
            logistics: get("LOGISTICS_EMAIL").unwrap_or(defaults.channels.logistics),
            sender: get("SENDER_EMAIL").unwrap_or(defaults.channels.sender),
        };

        let max_concurrency: usize =
            parse(&get, "PROCURA_MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "PROCURA_MAX_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            channels,
            mail_relay_url: get("MAIL_RELAY_URL"),
            ollama_url: get("OLLAMA_URL"),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            text_fallback: parse_bool(&get, "TEXT_FALLBACK")?.unwrap_or(defaults.text_fallback),
            max_concurrency,
            collaborator_timeout: secs(&get, "PROCURA_COLLABORATOR_TIMEOUT_SECS")?
                .unwrap_or(defaults.collaborator_timeout),
            quote_cooldown: secs(&get, "PROCURA_QUOTE_COOLDOWN_SECS")?
                .unwrap_or(defaults.quote_cooldown),
            intent_stale_after: secs(&get, "PROCURA_INTENT_STALE_SECS")?
                .unwrap_or(defaults.intent_stale_after),
            listen_addr: parse(&get, "PROCURA_LISTEN_ADDR")?.unwrap_or(defaults.listen_addr),
            store_retry: retries(&get, "PROCURA_STORE_RETRIES", defaults.store_retry)?,
            text_retry: retries(&get, "PROCURA_TEXT_RETRIES", defaults.text_retry)?,
            transport_retry: retries(&get, "PROCURA_TRANSPORT_RETRIES", defaults.transport_retry)?,
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

fn secs<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parse::<u64, G>(get, key)?.map(Duration::from_secs))
}

fn retries<G>(get: &G, key: &'static str, default: RetryPolicy) -> Result<RetryPolicy, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(match parse::<u32, G>(get, key)? {
        Some(count) => default.with_retries(count),
        None => default,
    })
}

fn parse_bool<G>(get: &G, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ProcuraConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.channels.manager, "manager@company.com");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.quote_cooldown, Duration::from_secs(86_400));
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.store_retry.retries, 3);
        assert_eq!(config.transport_retry.retries, 0);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ProcuraConfig::from_lookup(lookup(&[
            ("MANAGER_EMAIL", "boss@example.com"),
            ("PROCURA_MAX_CONCURRENCY", "8"),
            ("PROCURA_QUOTE_COOLDOWN_SECS", "0"),
            ("TEXT_FALLBACK", "off"),
            ("DATABASE_URL", " "),
            ("PROCURA_STORE_RETRIES", "0"),
            ("PROCURA_TRANSPORT_RETRIES", "2"),
        ]))
        .unwrap();
        assert_eq!(config.store_retry, RetryPolicy::no_retry());
        assert_eq!(config.transport_retry.retries, 2);
        assert_eq!(config.channels.manager, "boss@example.com");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.quote_cooldown, Duration::ZERO);
        assert!(!config.text_fallback);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = ProcuraConfig::from_lookup(lookup(&[("PROCURA_COLLABORATOR_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PROCURA_COLLABORATOR_TIMEOUT_SECS",
                value: "soon".to_string()
            }
        );
        assert!(ProcuraConfig::from_lookup(lookup(&[("PROCURA_MAX_CONCURRENCY", "0")])).is_err());
    }
}
