//! Configuration management

use std::{collections::HashMap, env, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::SessionUser;
use crate::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "API_WORKBENCH_";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// External store configuration
    pub store: StoreConfig,
    /// Auth gate configuration
    pub auth: AuthConfig,
    /// Outbound proxy configuration
    pub proxy: ProxyConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // API_WORKBENCH_STORE__URL -> store.url
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Supabase {
            let url = self.store.url.as_deref().unwrap_or_default();
            if url.is_empty() {
                return Err(Error::Config(
                    "store.url is required for the supabase backend".to_string(),
                ));
            }
            url::Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid store.url '{url}': {e}")))?;
            if self.store.resolve_key().is_none_or(|k| k.is_empty()) {
                return Err(Error::Config(
                    "store.key is required for the supabase backend".to_string(),
                ));
            }
        }

        if !self.auth.login_path.starts_with('/') {
            return Err(Error::Config(format!(
                "auth.login_path must start with '/': {}",
                self.auth.login_path
            )));
        }

        Ok(())
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);
            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in store settings
    fn expand_env_vars(&mut self) {
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        for value in [&mut self.store.url, &mut self.store.key]
            .into_iter()
            .flatten()
        {
            *value = expand_string(&re, value);
        }

        if let Some(seed) = self.store.seed_file.as_mut() {
            *seed = PathBuf::from(expand_string(&re, &seed.to_string_lossy()));
        }
    }
}

/// Expand environment variables in a string
fn expand_string(re: &Regex, value: &str) -> String {
    re.replace_all(value, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map_or("", |m| m.as_str());
        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .into_owned()
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Which external store binding to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tables (development, tests)
    #[default]
    Memory,
    /// Hosted Supabase project (PostgREST + GoTrue)
    Supabase,
}

impl StoreBackend {
    /// Backend name as used in config and health output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Supabase => "supabase",
        }
    }
}

/// External store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Store binding
    pub backend: StoreBackend,
    /// Supabase project URL (e.g. `https://xyz.supabase.co`)
    pub url: Option<String>,
    /// Supabase API key. Supports `env:VAR_NAME`
    pub key: Option<String>,
    /// YAML list of inbound API definitions to seed the memory store with
    pub seed_file: Option<PathBuf>,
    /// Access token -> user, for the memory store's session resolution
    pub sessions: HashMap<String, SessionUser>,
}

impl StoreConfig {
    /// Resolve the API key (expand `env:` references)
    #[must_use]
    pub fn resolve_key(&self) -> Option<String> {
        self.key.as_ref().map(|key| {
            if let Some(var_name) = key.strip_prefix("env:") {
                env::var(var_name).unwrap_or_default()
            } else {
                key.clone()
            }
        })
    }
}

/// Auth gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying the session access token
    pub session_cookie: String,
    /// Redirect anonymous navigations to `login_path` (default: false)
    pub require_login: bool,
    /// Where anonymous navigations are sent when `require_login` is on
    pub login_path: String,
    /// Path prefixes that never redirect
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/login".to_string(),
        "/api/".to_string(),
        "/health".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "sb-access-token".to_string(),
            require_login: false,
            login_path: "/login".to_string(),
            public_paths: default_public_paths(),
        }
    }
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Per-request timeout for forwarded calls (none by default)
    #[serde(with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    /// User-Agent sent when the caller does not set one
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("api-workbench/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s", "250ms")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parse "30s", "5m", "100ms" or a bare number of seconds
    pub fn parse(s: &str) -> Result<Duration, std::num::ParseIntError> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>().map(|m| Duration::from_secs(m * 60))
        } else {
            s.parse::<u64>().map(Duration::from_secs)
        }
    }

    /// Same format for `Option<Duration>`; absent or null means `None`
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional duration
        ///
        /// # Errors
        ///
        /// Returns a serialization error if the serializer fails.
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional duration
        ///
        /// # Errors
        ///
        /// Returns a deserialization error if the string cannot be parsed as a duration.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.session_cookie, "sb-access-token");
        assert!(!config.auth.require_login);
        assert!(config.proxy.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
server:
  port: 8080
  shutdown_timeout: 5s
store:
  backend: supabase
  url: https://example.supabase.co
  key: anon-key
auth:
  require_login: true
proxy:
  timeout: 1500ms
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.store.backend, StoreBackend::Supabase);
        assert!(config.auth.require_login);
        assert_eq!(config.auth.login_path, "/login");
        assert_eq!(config.proxy.timeout, Some(Duration::from_millis(1500)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_supabase_requires_url_and_key() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Supabase;
        assert!(config.validate().is_err());

        config.store.url = Some("https://example.supabase.co".to_string());
        assert!(config.validate().is_err());

        config.store.key = Some("anon".to_string());
        assert!(config.validate().is_ok());

        config.store.url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_login_path_must_be_absolute() {
        let mut config = Config::default();
        config.auth.login_path = "login".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_parse() {
        use humantime_serde::parse;
        assert_eq!(parse("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse("7").unwrap(), Duration::from_secs(7));
        assert!(parse("soon").is_err());
    }

    #[test]
    fn test_resolve_key_from_env() {
        // PATH is always set; avoids mutating the environment (unsafe in edition 2024)
        let store = StoreConfig {
            key: Some("env:PATH".to_string()),
            ..Default::default()
        };
        assert_eq!(store.resolve_key(), env::var("PATH").ok());

        let literal = StoreConfig {
            key: Some("literal".to_string()),
            ..Default::default()
        };
        assert_eq!(literal.resolve_key().as_deref(), Some("literal"));
    }

    #[test]
    fn test_expand_string_default() {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
        assert_eq!(
            expand_string(&re, "${API_WB_TEST_SURELY_UNSET:-https://fallback.dev}"),
            "https://fallback.dev"
        );
        assert_eq!(expand_string(&re, "plain"), "plain");
    }

    #[test]
    fn test_load_from_file_with_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "API_WB_TEST_SUPABASE_URL=https://from-env-file.supabase.co").unwrap();
        drop(f);

        let config_path = dir.path().join("workbench.yaml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            "env_files:\n  - {}\nstore:\n  backend: supabase\n  url: \"${{API_WB_TEST_SUPABASE_URL}}\"\n  key: k",
            env_path.display()
        )
        .unwrap();
        drop(f);

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(
            config.store.url.as_deref(),
            Some("https://from-env-file.supabase.co")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/workbench.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_sessions_deserialized() {
        let yaml = r#"
store:
  sessions:
    tok-1:
      id: user-1
      email: dev@example.com
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let user = &config.store.sessions["tok-1"];
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("dev@example.com"));
    }
}
