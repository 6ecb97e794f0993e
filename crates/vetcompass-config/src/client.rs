//! Client credentials and connection settings.
//!
//! Read from `<config dir>/vetcompass/client.toml`:
//!
//! ```toml
//! client-id = "6219abd9-b229-458c-baa0-2fc80763193e"
//! shared-secret = "not very secret"
//! base-url = "https://vetcompass.herokuapp.com/api/1.0/session/"
//! timeout-ms = 5000
//! ```
//!
//! Every setting can be overridden by an environment variable
//! (`VETCOMPASS_CLIENT_ID`, `VETCOMPASS_SHARED_SECRET`, `VETCOMPASS_BASE_URL`,
//! `VETCOMPASS_TIMEOUT_MS`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{ConfigError, Result};

/// Default config filename.
const CLIENT_CONFIG_FILE: &str = "client.toml";

/// Application directory under the platform config dir.
const APP_NAME: &str = "vetcompass";

/// Overrides the config directory. Useful for testing.
pub const CONFIG_DIR_ENV: &str = "VETCOMPASS_CONFIG_DIR";

pub const CLIENT_ID_ENV: &str = "VETCOMPASS_CLIENT_ID";
pub const SHARED_SECRET_ENV: &str = "VETCOMPASS_SHARED_SECRET";
pub const BASE_URL_ENV: &str = "VETCOMPASS_BASE_URL";
pub const TIMEOUT_MS_ENV: &str = "VETCOMPASS_TIMEOUT_MS";

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// Settings as written in the config file; every field is optional until
/// [`resolve`](ClientConfig::resolve) is called.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Client id issued by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Shared secret used to sign requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,

    /// Session resource URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Timeout for every network operation, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(client_id) = get(CLIENT_ID_ENV) {
            self.client_id = Some(client_id);
        }
        if let Some(secret) = get(SHARED_SECRET_ENV) {
            self.shared_secret = Some(secret);
        }
        if let Some(base_url) = get(BASE_URL_ENV) {
            self.base_url = Some(base_url);
        }
        if let Some(timeout) = get(TIMEOUT_MS_ENV) {
            let timeout = timeout
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: TIMEOUT_MS_ENV.to_string(),
                    message: e.to_string(),
                })?;
            self.timeout_ms = Some(timeout);
        }
        Ok(self)
    }

    /// Check every setting and convert to typed values.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| missing("client-id", CLIENT_ID_ENV))?;
        let client_id = Uuid::parse_str(client_id.trim()).map_err(|e| ConfigError::InvalidValue {
            field: "client-id".to_string(),
            message: e.to_string(),
        })?;

        let shared_secret = self
            .shared_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("shared-secret", SHARED_SECRET_ENV))?;

        let base_url = self
            .base_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                    field: "base-url".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let timeout = match self.timeout_ms {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    field: "timeout-ms".to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        Ok(ResolvedConfig {
            client_id,
            shared_secret,
            base_url,
            timeout,
        })
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn missing(field: &str, env_var: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
        path: client_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| CLIENT_CONFIG_FILE.to_string()),
        env_var: env_var.to_string(),
    }
}

/// Validated settings ready to build a session factory from.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub client_id: Uuid,
    pub shared_secret: String,
    /// `None` means the service default.
    pub base_url: Option<Url>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("client_id", &self.client_id)
            .field("shared_secret", &"<redacted>")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Get the vetcompass config directory.
///
/// Checks `VETCOMPASS_CONFIG_DIR` first, then falls back to the platform
/// default (`~/.config/vetcompass` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the path to the client config file.
pub fn client_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CLIENT_CONFIG_FILE))
}

/// Load client configuration with environment overrides applied.
///
/// An explicit `path` must exist. Without one, the default path is used if
/// present, otherwise the environment alone.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => load_client_config_file(path)?,
        None => load_client_config_from(client_config_path().as_deref())?,
    };
    config.with_env()
}

/// Load client config from a path, returning an empty config if it is
/// missing.
pub fn load_client_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };

    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    load_client_config_file(path)
}

/// Load client config from a file that must exist.
pub fn load_client_config_file(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientConfig::from_toml(&contents)
}

/// Save client config to a specific path.
pub fn save_client_config_to(config: &ClientConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const CLIENT_ID: &str = "6219abd9-b229-458c-baa0-2fc80763193e";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn full_config() -> ClientConfig {
        ClientConfig {
            client_id: Some(CLIENT_ID.to_string()),
            shared_secret: Some("not very secret".to_string()),
            base_url: Some("http://localhost:5000/api/1.0/session/".to_string()),
            timeout_ms: Some(5000),
        }
    }

    #[test]
    fn test_parse_toml() {
        let config = ClientConfig::from_toml(
            r#"
            client-id = "6219abd9-b229-458c-baa0-2fc80763193e"
            shared-secret = "not very secret"
            timeout-ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.client_id.as_deref(), Some(CLIENT_ID));
        assert_eq!(config.timeout_ms, Some(250));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let result = ClientConfig::from_toml("client-id = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = full_config()
            .with_env_from(env(&[
                (SHARED_SECRET_ENV, "from env"),
                (TIMEOUT_MS_ENV, "100"),
                (BASE_URL_ENV, ""),
            ]))
            .unwrap();

        assert_eq!(config.shared_secret.as_deref(), Some("from env"));
        assert_eq!(config.timeout_ms, Some(100));
        assert_eq!(
            config.base_url.as_deref(),
            Some("http://localhost:5000/api/1.0/session/")
        );
    }

    #[test]
    fn test_env_rejects_bad_timeout() {
        let result = full_config().with_env_from(env(&[(TIMEOUT_MS_ENV, "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_resolve_full_config() {
        let resolved = full_config().resolve().unwrap();
        assert_eq!(resolved.client_id.to_string(), CLIENT_ID);
        assert_eq!(resolved.timeout, Some(Duration::from_millis(5000)));
        assert_eq!(
            resolved.base_url.unwrap().as_str(),
            "http://localhost:5000/api/1.0/session/"
        );
    }

    #[test]
    fn test_resolve_requires_credentials() {
        let mut config = full_config();
        config.client_id = None;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingField { .. })
        ));

        let mut config = full_config();
        config.shared_secret = Some(String::new());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let mut config = full_config();
        config.client_id = Some("not-a-uuid".to_string());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut config = full_config();
        config.base_url = Some("no scheme".to_string());
        assert!(config.resolve().is_err());

        let mut config = full_config();
        config.timeout_ms = Some(0);
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", full_config());
        assert!(!debug.contains("not very secret"));
        let debug = format!("{:?}", full_config().resolve().unwrap());
        assert!(!debug.contains("not very secret"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client.toml");

        save_client_config_to(&full_config(), &path).unwrap();
        let loaded = load_client_config_file(&path).unwrap();
        assert_eq!(loaded, full_config());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = load_client_config_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = load_client_config_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
