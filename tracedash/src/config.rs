//! Configuration loading and validation.
//!
//! Configuration is read from a YAML file (default `config.yaml`) and can be
//! overridden with `TRACEDASH_`-prefixed environment variables, using `__` to
//! separate nesting levels:
//!
//! ```bash
//! TRACEDASH_PORT=8080
//! TRACEDASH_TRACE_STORE__BASE_URL=https://traces.internal/api/v1
//! TRACEDASH_TRACE_STORE__API_KEY=sk-...
//! TRACEDASH_FETCH__MAX_PARALLEL_REQUESTS=5
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TRACEDASH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host address to bind the HTTP server to
    pub host: String,
    /// Port to bind the HTTP server to
    pub port: u16,
    /// Upstream trace store connection settings
    pub trace_store: TraceStoreConfig,
    /// Page fetching and retry behavior
    pub fetch: FetchConfig,
    /// Page cache behavior
    pub cache: CacheConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            trace_store: TraceStoreConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// Connection settings for the upstream trace store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceStoreConfig {
    /// Base URL of the trace store API
    pub base_url: Url,
    /// API key sent in the `x-api-key` header, if the store requires one
    pub api_key: Option<String>,
    /// Project (trace collection) to query
    pub project: String,
    /// Per-request timeout for trace store calls
    #[serde(with = "humantime_serde")]
    pub api_timeout: Duration,
}

impl Default for TraceStoreConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.smith.langchain.com/api/v1")
                .expect("default base URL is valid"),
            api_key: None,
            project: String::new(),
            api_timeout: Duration::from_secs(30),
        }
    }
}

/// Page fetching and retry behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Records requested per page
    pub page_size: usize,
    /// Maximum number of page fetches in flight at once
    pub max_parallel_requests: usize,
    /// Attempts per page before giving up
    pub retry_attempts: u32,
    /// Base backoff duration; attempt N waits N times this before retrying
    #[serde(with = "humantime_serde")]
    pub backoff_unit: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_parallel_requests: 3,
            retry_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Page cache behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a cached page stays fresh
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Maximum number of cached pages
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 128,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(
                Url::parse("http://localhost:3000").expect("default origin is valid"),
            )],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config
            .validate()
            .map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("TRACEDASH_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.trace_store.project.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: trace_store.project is not configured. \
                 Please set TRACEDASH_TRACE_STORE__PROJECT or add trace_store.project to the config file."
                    .to_string(),
            });
        }

        if self.fetch.page_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: fetch.page_size must be at least 1".to_string(),
            });
        }

        if self.fetch.max_parallel_requests == 0 {
            return Err(Error::Internal {
                operation: "Config validation: fetch.max_parallel_requests must be at least 1"
                    .to_string(),
            });
        }

        if self.cors.allow_credentials
            && self
                .cors
                .allowed_origins
                .iter()
                .any(|o| matches!(o, CorsOrigin::Wildcard))
        {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot allow credentials with a wildcard origin"
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.fetch.page_size, 100);
        assert_eq!(config.fetch.max_parallel_requests, 3);
        assert_eq!(config.fetch.retry_attempts, 3);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.capacity, 128);
    }

    #[test]
    fn validate_rejects_missing_project() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trace_store.project = "dashboard".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_wildcard_with_credentials() {
        let mut config = Config::default();
        config.trace_store.project = "dashboard".to_string();
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        assert!(config.validate().is_err());

        config.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cors_origin_parses_wildcard_and_urls() {
        let origins: Vec<CorsOrigin> =
            serde_json::from_value(serde_json::json!(["*", "https://app.example.com"])).unwrap();
        assert!(matches!(origins[0], CorsOrigin::Wildcard));
        assert!(matches!(origins[1], CorsOrigin::Url(_)));

        let bad: Result<CorsOrigin, _> = serde_json::from_value(serde_json::json!("not a url"));
        assert!(bad.is_err());
    }

    #[test]
    fn humantime_durations_parse_from_yaml() {
        let config: Config = serde_yaml_from_str(
            r#"
            trace_store:
              project: dashboard
              api_timeout: 10s
            cache:
              ttl: 2m
            "#,
        );
        assert_eq!(config.trace_store.api_timeout, Duration::from_secs(10));
        assert_eq!(config.cache.ttl, Duration::from_secs(120));
    }

    fn serde_yaml_from_str(yaml: &str) -> Config {
        Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .expect("test yaml parses")
    }
}
