use std::env;
use std::fmt;
use std::str::FromStr;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("CORS_ORIGINS must contain at least one non-empty origin")]
    NoTrustedOrigins,
}

/// Application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only through `AppState`.
#[derive(Clone)]
pub struct AppConfig {
    pub project_name: String,
    pub version: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub cors_origins: Vec<String>,
    /// Threshold for the classifier's body-size check (KB).
    pub max_body_size_kb: u64,
    /// Hard transport cap enforced before a handler reads the body.
    pub request_body_limit_kb: u64,
    pub rate_limit_per_minute: u32,
    pub express_api_key: String,
    pub express_server_url: Option<String>,
    pub logstash_host: Option<String>,
    pub logstash_port: u16,
    pub slow_request_threshold_ms: u64,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("project_name", &self.project_name)
            .field("version", &self.version)
            .field("api_prefix", &self.api_prefix)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("debug", &self.debug)
            .field("cors_origins", &self.cors_origins)
            .field("max_body_size_kb", &self.max_body_size_kb)
            .field("request_body_limit_kb", &self.request_body_limit_kb)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("express_api_key", &"<redacted>")
            .field("express_server_url", &self.express_server_url)
            .field("logstash_host", &self.logstash_host)
            .field("logstash_port", &self.logstash_port)
            .field("slow_request_threshold_ms", &self.slow_request_threshold_ms)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw),
            None => vec![
                "http://example.com".to_string(),
                "http://anotherdomain.com".to_string(),
            ],
        };
        if cors_origins.is_empty() {
            return Err(ConfigError::NoTrustedOrigins);
        }

        Ok(Self {
            project_name: get("PROJECT_NAME")
                .unwrap_or_else(|| "Express Security Gateway".to_string()),
            version: get("VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            api_prefix: get("API_V1_PREFIX").unwrap_or_else(|| "/api/v1".to_string()),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8080)?,
            debug: parse_bool("DEBUG", get("DEBUG"))?,
            cors_origins,
            max_body_size_kb: parse_or("MAX_BODY_SIZE", get("MAX_BODY_SIZE"), 100)?,
            request_body_limit_kb: parse_or(
                "REQUEST_BODY_LIMIT_KB",
                get("REQUEST_BODY_LIMIT_KB"),
                1024,
            )?,
            rate_limit_per_minute: parse_or(
                "RATE_LIMIT_PER_MINUTE",
                get("RATE_LIMIT_PER_MINUTE"),
                100,
            )?,
            express_api_key: get("EXPRESS_API_KEY").ok_or(ConfigError::Missing("EXPRESS_API_KEY"))?,
            express_server_url: get("EXPRESS_SERVER_URL"),
            logstash_host: get("LOGSTASH_HOST"),
            logstash_port: parse_or("LOGSTASH_PORT", get("LOGSTASH_PORT"), 5000)?,
            slow_request_threshold_ms: parse_or(
                "SLOW_REQUEST_THRESHOLD_MS",
                get("SLOW_REQUEST_THRESHOLD_MS"),
                1000,
            )?,
        })
    }

    /// Address string for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw.unwrap_or_default(),
            }),
        },
    }
}
