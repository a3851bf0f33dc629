//! Runtime configuration loaded from `.env` and the process environment

use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::query::PAGE_SIZE;

/// Public GraphQL endpoint serving the `rekts` listing
pub const DEFAULT_API_URL: &str = "https://public-api.defiyield.app/graphql/";

/// Attempts per page before the run is abandoned
pub const DEFAULT_API_RETRIES: u32 = 5;

/// Pause between failed attempts
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 2;

/// Directory the charts are written to
pub const DEFAULT_OUTPUT_DIR: &str = "./graphs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_KEY is not set (add it to the environment or the .env file)")]
    MissingApiKey,
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Failed to read env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenv::Error,
    },
}

/// Everything the fetcher and reporter need, passed explicitly at construction
#[derive(Debug)]
pub struct Config {
    pub api_key: SecretString,
    pub api_url: String,
    pub page_size: u32,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Option<Duration>,
    pub output_dir: PathBuf,
}

impl Config {
    /// Read `env_file` (if it exists) and the process environment into a config.
    ///
    /// Variables already present in the process environment take precedence
    /// over the file.
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        let file_vars = if env_file.exists() {
            let vars = read_env_file(env_file)?;
            tracing::debug!("Loaded {} variables from {:?}", vars.len(), env_file);
            vars
        } else {
            tracing::debug!("No env file at {:?}, using process environment", env_file);
            HashMap::new()
        };

        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("API_KEY")
            .map(SecretString::from)
            .ok_or(ConfigError::MissingApiKey)?;

        let api_url = get("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let page_size = parse_positive("PAGE_SIZE", get("PAGE_SIZE"))?
            .map(|v| v as u32)
            .unwrap_or(PAGE_SIZE);
        let max_attempts = parse_positive("API_RETRIES", get("API_RETRIES"))?
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_API_RETRIES);

        let retry_backoff = match get("RETRY_BACKOFF_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("RETRY_BACKOFF_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
        };

        let request_timeout = parse_positive("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"))?
            .map(Duration::from_secs);

        let output_dir = get("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            api_key,
            api_url,
            page_size,
            max_attempts,
            retry_backoff,
            request_timeout,
            output_dir,
        })
    }
}

/// Parse a `.env` file without touching the process environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let mut vars = HashMap::new();
    for item in dotenv::from_path_iter(path).map_err(env_file_error)? {
        let (key, value) = item.map_err(env_file_error)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = parse_u64(key, &raw)?;
    if value == 0 || value > u32::MAX as u64 {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "must be a positive 32-bit integer".to_string(),
        });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_key.expose_secret(), "secret");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_secs(2));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.output_dir, PathBuf::from("./graphs"));
    }

    #[test]
    fn test_missing_api_key() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));

        let err = Config::from_lookup(lookup(&[("API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("API_URL", "http://localhost:4000/graphql"),
            ("PAGE_SIZE", "20"),
            ("API_RETRIES", "3"),
            ("RETRY_BACKOFF_SECS", "0"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("OUTPUT_DIR", "/tmp/charts"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:4000/graphql");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::ZERO);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/charts"));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("PAGE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PAGE_SIZE", .. }));

        let err =
            Config::from_lookup(lookup(&[("API_KEY", "k"), ("API_RETRIES", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "API_RETRIES", .. }));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "super-secret-value")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
    }

    #[test]
    fn test_env_file_values_reach_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# local credentials\nAPI_KEY=from-file\nAPI_URL=http://localhost:4000/graphql\nPAGE_SIZE=25\n",
        )
        .unwrap();

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.len(), 3);

        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.api_key.expose_secret(), "from-file");
        assert_eq!(config.api_url, "http://localhost:4000/graphql");
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_load_does_not_export_file_vars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_KEY=from-file\nREKT_CHARTS_ENV_FILE_ONLY=1\n").unwrap();

        let config = Config::load(&path).unwrap();
        let expected = std::env::var("API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "from-file".to_string());
        assert_eq!(config.api_key.expose_secret(), expected);
        assert!(std::env::var("REKT_CHARTS_ENV_FILE_ONLY").is_err());
    }

    #[test]
    fn test_missing_env_file_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.env");
        assert!(!missing.exists());
        // Result depends only on the process environment here.
        let from_env = std::env::var("API_KEY").ok().filter(|v| !v.trim().is_empty());
        assert_eq!(Config::load(&missing).is_ok(), from_env.is_some());
    }

    #[test]
    fn test_unreadable_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_env_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }
}
