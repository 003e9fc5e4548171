use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use extract::llm::{DEFAULT_API_URL, DEFAULT_API_VERSION, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub retry: RetryConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{}', expected 'pretty' or 'json'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// `None` allows any origin.
    pub cors_allow_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl GenerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
                cors_allow_origin: None,
            },
            generation: GenerationConfig {
                api_url: DEFAULT_API_URL.to_string(),
                api_key: None,
                api_version: DEFAULT_API_VERSION.to_string(),
                model: DEFAULT_MODEL.to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
                request_timeout_secs: 60,
            },
            // No retries unless an operator opts in.
            retry: RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let request_timeout_secs: u64 = parse_or(
            &get,
            "ANALYZER_TIMEOUT_SECS",
            defaults.generation.request_timeout_secs,
        )?;
        if request_timeout_secs == 0 {
            anyhow::bail!("invalid value for ANALYZER_TIMEOUT_SECS: must be greater than zero");
        }

        Ok(Self {
            server: ServerConfig {
                bind_addr: parse_or(&get, "BIND_ADDR", defaults.server.bind_addr)?,
                cors_allow_origin: get("CORS_ALLOW_ORIGIN"),
            },
            generation: GenerationConfig {
                api_url: get("ANTHROPIC_API_URL").unwrap_or(defaults.generation.api_url),
                api_key: get("ANTHROPIC_API_KEY"),
                api_version: get("ANTHROPIC_VERSION").unwrap_or(defaults.generation.api_version),
                model: get("ANALYZER_MODEL").unwrap_or(defaults.generation.model),
                max_tokens: parse_or(&get, "ANALYZER_MAX_TOKENS", defaults.generation.max_tokens)?,
                request_timeout_secs,
            },
            retry: RetryConfig {
                max_retries: parse_or(&get, "ANALYZER_MAX_RETRIES", defaults.retry.max_retries)?,
                initial_backoff_ms: parse_or(
                    &get,
                    "ANALYZER_INITIAL_BACKOFF_MS",
                    defaults.retry.initial_backoff_ms,
                )?,
                max_backoff_ms: parse_or(&get, "ANALYZER_MAX_BACKOFF_MS", defaults.retry.max_backoff_ms)?,
            },
            log_format: parse_or(&get, "LOG_FORMAT", defaults.log_format)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.server.bind_addr.port(), 3000);
        assert!(config.generation.api_key.is_none());
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.generation.max_tokens, 2000);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("ANTHROPIC_API_URL", "http://localhost:9999"),
            ("ANALYZER_MAX_TOKENS", "1024"),
            ("ANALYZER_TIMEOUT_SECS", "15"),
            ("ANALYZER_MAX_RETRIES", "2"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("CORS_ALLOW_ORIGIN", "https://copilot.example.com"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.generation.api_url, "http://localhost:9999");
        assert_eq!(config.generation.max_tokens, 1024);
        assert_eq!(config.generation.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.server.cors_allow_origin.as_deref(),
            Some("https://copilot.example.com")
        );
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_api_key_counts_as_unset() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "   ")]).unwrap();
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = config_from(&[("ANALYZER_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(format!("{:#}", err).contains("ANALYZER_MAX_TOKENS"));
    }

    #[test]
    fn test_zero_timeout_is_an_error() {
        let err = config_from(&[("ANALYZER_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ANALYZER_TIMEOUT_SECS"));

        let config = config_from(&[("ANALYZER_TIMEOUT_SECS", "1")]).unwrap();
        assert_eq!(config.generation.request_timeout_secs, 1);
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "sk-secret")]).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
