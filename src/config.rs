//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

const DEFAULT_DB_PATH: &str = "./data/financial_data.db";
const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_QUICKBOOKS_FILE: &str = "data_set_1.json";
const DEFAULT_ROOTFI_FILE: &str = "data_set_2.json";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_TIMEOUT_SECS: &str = "60";

/// Service configuration, read from `FIN_ASSIST_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file. The parent directory is created on open.
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub quickbooks_file: PathBuf,
    pub rootfi_file: PathBuf,
    /// Load both data files before serving.
    pub load_on_startup: bool,
    /// Directory for rolling daily log files. Stdout only when unset.
    pub log_dir: Option<PathBuf>,
    /// `None` when `OPENAI_API_KEY` is unset. AI endpoints then refuse requests.
    pub llm: Option<LlmConfig>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm = match var("OPENAI_API_KEY") {
            Some(key) => Some(LlmConfig {
                api_key: SecretString::from(key),
                model: var("FIN_ASSIST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: var("FIN_ASSIST_LLM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                timeout: Duration::from_secs(parse_or(
                    "FIN_ASSIST_LLM_TIMEOUT_SECS",
                    var("FIN_ASSIST_LLM_TIMEOUT_SECS"),
                    DEFAULT_LLM_TIMEOUT_SECS,
                )?),
            }),
            None => None,
        };

        Ok(Self {
            db_path: var("FIN_ASSIST_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            bind: parse_or("FIN_ASSIST_BIND", var("FIN_ASSIST_BIND"), DEFAULT_BIND)?,
            quickbooks_file: var("FIN_ASSIST_QUICKBOOKS_FILE")
                .unwrap_or_else(|| DEFAULT_QUICKBOOKS_FILE.to_string())
                .into(),
            rootfi_file: var("FIN_ASSIST_ROOTFI_FILE")
                .unwrap_or_else(|| DEFAULT_ROOTFI_FILE.to_string())
                .into(),
            load_on_startup: parse_bool(
                "FIN_ASSIST_LOAD_ON_STARTUP",
                var("FIN_ASSIST_LOAD_ON_STARTUP"),
            )?,
            log_dir: var("FIN_ASSIST_LOG_DIR").map(PathBuf::from),
            llm,
        })
    }
}

/// Parse `raw`, falling back to `default` when the variable is unset.
fn parse_or<T>(key: &str, raw: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("./data/financial_data.db"));
        assert_eq!(cfg.bind.port(), 8000);
        assert_eq!(cfg.quickbooks_file, PathBuf::from("data_set_1.json"));
        assert_eq!(cfg.rootfi_file, PathBuf::from("data_set_2.json"));
        assert!(!cfg.load_on_startup);
        assert!(cfg.log_dir.is_none());
        assert!(cfg.llm.is_none());
    }

    #[test]
    fn api_key_enables_llm() {
        let cfg = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("FIN_ASSIST_MODEL", "gpt-4o"),
            ("FIN_ASSIST_LLM_TIMEOUT_SECS", "15"),
        ])
        .unwrap();
        let llm = cfg.llm.unwrap();
        assert_eq!(llm.api_key.expose_secret(), "sk-test");
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.base_url, "https://api.openai.com/v1");
        assert_eq!(llm.timeout, Duration::from_secs(15));
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let cfg = config(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(cfg.llm.is_none());
    }

    #[test]
    fn overrides_and_flags() {
        let cfg = config(&[
            ("FIN_ASSIST_BIND", "127.0.0.1:9090"),
            ("FIN_ASSIST_LOAD_ON_STARTUP", "yes"),
            ("FIN_ASSIST_LOG_DIR", "/var/log/fin-assist"),
        ])
        .unwrap();
        assert_eq!(cfg.bind.to_string(), "127.0.0.1:9090");
        assert!(cfg.load_on_startup);
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/var/log/fin-assist")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = config(&[("FIN_ASSIST_BIND", "not-an-address")]).unwrap_err();
        assert!(err.to_string().contains("FIN_ASSIST_BIND"));

        let err = config(&[("FIN_ASSIST_LOAD_ON_STARTUP", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("FIN_ASSIST_LLM_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("FIN_ASSIST_LLM_TIMEOUT_SECS"));
    }
}
