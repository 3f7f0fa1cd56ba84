//! Process-wide settings, read once at startup and passed down by reference.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_REPORT_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
#[error("Invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gemini: GeminiConfig,
    pub report_dir: PathBuf,
    /// Reports not downloaded within this window are swept.
    pub report_ttl: Duration,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Render a report with the error text as its body when the description
    /// service fails, instead of failing the request.
    pub render_remote_failures: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            report_dir: std::env::temp_dir().join("scenescan-reports"),
            report_ttl: Duration::from_secs(DEFAULT_REPORT_TTL_SECS),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            render_remote_failures: true,
        }
    }
}

impl ServiceConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match get("DESCRIBE_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("DESCRIBE_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError {
                key: "DESCRIBE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        Ok(Self {
            gemini: GeminiConfig {
                api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL").unwrap_or(defaults.gemini.model),
                endpoint: get("GEMINI_ENDPOINT").unwrap_or(defaults.gemini.endpoint),
                timeout: Duration::from_secs(timeout_secs),
            },
            report_dir: get("REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            report_ttl: match get("REPORT_TTL_SECS") {
                Some(raw) => Duration::from_secs(parse_number("REPORT_TTL_SECS", &raw)?),
                None => defaults.report_ttl,
            },
            port: match get("PORT") {
                Some(raw) => parse_number("PORT", &raw)?,
                None => defaults.port,
            },
            max_upload_bytes: match get("MAX_UPLOAD_BYTES") {
                Some(raw) => parse_number("MAX_UPLOAD_BYTES", &raw)?,
                None => defaults.max_upload_bytes,
            },
            render_remote_failures: match get("RENDER_REMOTE_FAILURES") {
                Some(raw) => parse_flag("RENDER_REMOTE_FAILURES", &raw)?,
                None => defaults.render_remote_failures,
            },
        })
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
