//! Server configuration
//!
//! Resolution order, later wins: built-in defaults, an optional TOML file,
//! `DELIVERY_*` environment variables, then command-line flags. Secrets are
//! wrapped in [`SecretString`] as soon as they are read.

use delivery_sync::{GitHubConfig, DEFAULT_API_BASE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`ServerConfig::github_token`]
pub const ENV_GITHUB_TOKEN: &str = "DELIVERY_GITHUB_TOKEN";
/// Environment variable overriding [`ServerConfig::webhook_secret`]
pub const ENV_WEBHOOK_SECRET: &str = "DELIVERY_WEBHOOK_SECRET";
/// Environment variable overriding [`ServerConfig::bind`]
pub const ENV_BIND: &str = "DELIVERY_BIND";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`ServerConfig`]
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// Webhook signature verification cannot be disabled
    #[error("a webhook secret is required (set webhook_secret or {ENV_WEBHOOK_SECRET})")]
    MissingWebhookSecret,

    /// Tracker calls need credentials
    #[error("a GitHub token is required (set github_token or {ENV_GITHUB_TOKEN})")]
    MissingGithubToken,
}

/// On-disk shape; every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind: Option<SocketAddr>,
    github_api_base: Option<String>,
    github_token: Option<String>,
    webhook_secret: Option<String>,
    request_timeout_secs: Option<u64>,
    cors_origins: Option<Vec<String>>,
}

/// Resolved server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Tracker REST base URL
    pub github_api_base: String,
    pub github_token: Option<SecretString>,
    /// Shared secret for `X-Hub-Signature-256`
    pub webhook_secret: Option<SecretString>,
    /// Upper bound on each tracker call
    pub request_timeout_secs: u64,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("github_api_base", &self.github_api_base)
            .field("github_token", &redact(&self.github_token))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            github_api_base: DEFAULT_API_BASE.to_string(),
            github_token: None,
            webhook_secret: None,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    let value = value.trim();
    (!value.is_empty()).then(|| SecretString::from(value))
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document over the defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        let mut config = Self::default();
        if let Some(bind) = file.bind {
            config.bind = bind;
        }
        if let Some(base) = file.github_api_base {
            config.github_api_base = base;
        }
        config.github_token = file.github_token.and_then(non_empty_secret);
        config.webhook_secret = file.webhook_secret.and_then(non_empty_secret);
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(origins) = file.cors_origins {
            config.cors_origins = origins;
        }
        Ok(config)
    }

    /// Load from `path`, or the defaults when no file is given
    ///
    /// # Errors
    /// [`ConfigError::Read`] or [`ConfigError::Parse`]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `DELIVERY_*` overrides read through `lookup`
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if `DELIVERY_BIND` is not a socket address
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_GITHUB_TOKEN).and_then(non_empty_secret) {
            self.github_token = Some(token);
        }
        if let Some(secret) = lookup(ENV_WEBHOOK_SECRET).and_then(non_empty_secret) {
            self.webhook_secret = Some(secret);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind = bind.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    key: ENV_BIND,
                    message: e.to_string(),
                }
            })?;
        }
        Ok(self)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// See [`ServerConfig::with_env_overrides`]
    pub fn with_process_env(self) -> Result<Self, ConfigError> {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With tracker base URL
    #[inline]
    #[must_use]
    pub fn with_github_api_base(mut self, base: impl Into<String>) -> Self {
        self.github_api_base = base.into();
        self
    }

    /// With tracker token
    #[inline]
    #[must_use]
    pub fn with_github_token(mut self, token: SecretString) -> Self {
        self.github_token = Some(token);
        self
    }

    /// With webhook secret
    #[inline]
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: SecretString) -> Self {
        self.webhook_secret = Some(secret);
        self
    }

    /// With CORS origins
    #[inline]
    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Tracker request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check everything the server needs to start
    ///
    /// # Errors
    /// The first missing or unusable setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.webhook_secret()?;
        self.github_config()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// The webhook secret, required
    ///
    /// # Errors
    /// [`ConfigError::MissingWebhookSecret`]
    pub fn webhook_secret(&self) -> Result<SecretString, ConfigError> {
        self.webhook_secret
            .clone()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or(ConfigError::MissingWebhookSecret)
    }

    /// Tracker client settings
    ///
    /// # Errors
    /// [`ConfigError::MissingGithubToken`], or [`ConfigError::Invalid`] on an
    /// empty base URL
    pub fn github_config(&self) -> Result<GitHubConfig, ConfigError> {
        let token = self
            .github_token
            .clone()
            .ok_or(ConfigError::MissingGithubToken)?;
        if self.github_api_base.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "github_api_base",
                message: "must not be empty".into(),
            });
        }
        Ok(GitHubConfig::new(token)
            .with_api_base(self.github_api_base.trim_end_matches('/'))
            .with_timeout(self.request_timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_refuse_to_start() {
        let config = ServerConfig::new();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.github_api_base, DEFAULT_API_BASE);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWebhookSecret)
        ));
    }

    #[test]
    fn file_values_are_applied() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"
            github_api_base = "https://ghe.example.com/api/v3/"
            github_token = "ghp_file"
            webhook_secret = "whsec_file"
            request_timeout_secs = 5
            cors_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.cors_origins, vec!["https://app.example.com"]);
        let github = config.github_config().unwrap();
        assert_eq!(github.api_base, "https://ghe.example.com/api/v3");
        assert_eq!(github.token.expose_secret(), "ghp_file");
        assert_eq!(
            config.webhook_secret().unwrap().expose_secret(),
            "whsec_file"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ServerConfig::from_toml_str("webhook_secrets = \"typo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let config = ServerConfig::from_toml_str("webhook_secret = \"   \"").unwrap();
        assert!(config.webhook_secret.is_none());
        assert!(matches!(
            config.webhook_secret(),
            Err(ConfigError::MissingWebhookSecret)
        ));
    }

    #[test]
    fn environment_overrides_file() {
        let config = ServerConfig::from_toml_str("webhook_secret = \"from-file\"")
            .unwrap()
            .with_env_overrides(env(&[
                (ENV_WEBHOOK_SECRET, "from-env"),
                (ENV_GITHUB_TOKEN, "ghp_env"),
                (ENV_BIND, "127.0.0.1:7000"),
            ]))
            .unwrap();

        assert_eq!(config.webhook_secret().unwrap().expose_secret(), "from-env");
        assert_eq!(config.bind.port(), 7000);
        config.validate().unwrap();
    }

    #[test]
    fn bad_bind_override() {
        let err = ServerConfig::new()
            .with_env_overrides(env(&[(ENV_BIND, "not-an-address")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_BIND, .. }));
    }

    #[test]
    fn missing_token_is_reported() {
        let config = ServerConfig::new().with_webhook_secret(SecretString::from("s"));
        assert!(matches!(config.validate(), Err(ConfigError::MissingGithubToken)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "webhook_secret = \"disk\"\ngithub_token = \"ghp_disk\"").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        config.validate().unwrap();
        assert_eq!(config.webhook_secret().unwrap().expose_secret(), "disk");
    }

    #[test]
    fn load_missing_file() {
        let err = ServerConfig::load(Some(Path::new("/nonexistent/delivery.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ServerConfig::new().with_webhook_secret(SecretString::from("hunter2"));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
