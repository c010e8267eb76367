//! Configuration file handling and remote execution settings
//!
//! Two layers feed the runner: the TOML config file (timeouts, codec policy,
//! process-level properties) and the environment. Remote execution settings
//! are looked up in the environment first and fall back to properties.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Remote execution service settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// In-process engine settings
    #[serde(default)]
    pub local: LocalConfig,

    /// Recipe decoding settings
    #[serde(default)]
    pub codec: CodecConfig,

    /// Process-level properties (e.g. `testserver.endpoint`)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// How recipes are submitted to the remote service
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Block on a single request until the service answers with the report
    #[default]
    Sync,
    /// Submit, then poll the execution status until it finishes
    Async,
}

/// Remote execution service settings
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Total time allowed for one HTTP exchange with the service
    #[serde(default = "default_remote_timeout")]
    pub request_timeout_secs: u64,

    /// Time allowed to establish the connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Submission mode
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Delay between status polls in async mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_remote_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            mode: ExecutionMode::default(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_remote_timeout() -> u64 {
    300
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    500
}

/// In-process engine settings
#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    /// Timeout for each request step
    #[serde(default = "default_local_timeout")]
    pub request_timeout_secs: u64,

    /// Follow HTTP redirects
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// User-Agent header sent by request steps
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_local_timeout(),
            follow_redirects: default_follow_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_local_timeout() -> u64 {
    30
}
fn default_follow_redirects() -> bool {
    true
}
fn default_user_agent() -> String {
    "recipe-runner".to_string()
}

/// Recipe decoding settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CodecConfig {
    /// Keep records with unregistered type tags as plugin records
    #[serde(default)]
    pub allow_plugins: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

/// Process-level property store
///
/// Seeded from the config file and `--property` flags, readable from any
/// thread.
#[derive(Debug, Default)]
pub struct Properties {
    values: RwLock<BTreeMap<String, String>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.into(), value.into());
    }

    /// Parse a `key=value` assignment as given on the command line
    pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            Error::Config(format!("Expected key=value, got '{}'", assignment))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Config(format!("Empty property name in '{}'", assignment)));
        }
        Ok((key.to_string(), value.to_string()))
    }
}

/// A setting readable from the environment or from a process property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
    pub env: &'static str,
    pub property: &'static str,
}

pub const ENDPOINT: ConfigKey = ConfigKey {
    env: "TESTSERVER_ENDPOINT",
    property: "testserver.endpoint",
};

pub const USER: ConfigKey = ConfigKey {
    env: "TESTSERVER_USER",
    property: "testserver.user",
};

pub const PASSWORD: ConfigKey = ConfigKey {
    env: "TESTSERVER_PASSWORD",
    property: "testserver.password",
};

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Layered lookup: environment variable first, then process property
#[derive(Clone)]
pub struct Settings {
    env: EnvLookup,
    properties: Arc<Properties>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Read the real process environment
    pub fn from_process(properties: Arc<Properties>) -> Self {
        Self::with_env(|key| std::env::var(key).ok(), properties)
    }

    /// Use a custom environment lookup (tests, embedding)
    pub fn with_env<F>(env: F, properties: Arc<Properties>) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            env: Arc::new(env),
            properties,
        }
    }

    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }

    /// First non-blank value wins: environment, then property
    pub fn lookup(&self, key: &ConfigKey) -> Option<String> {
        (self.env)(key.env)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.properties.get(key.property))
            .filter(|v| !v.trim().is_empty())
    }

    /// Snapshot of the remote execution settings
    pub fn remote(&self) -> RemoteSettings {
        RemoteSettings {
            endpoint: self.lookup(&ENDPOINT),
            user: self.lookup(&USER),
            password: self.lookup(&PASSWORD),
        }
    }
}

/// Remote endpoint and credentials as configured
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RemoteSettings {
    pub endpoint: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(env: &[(&str, &str)], props: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let properties = Properties::new();
        for (k, v) in props {
            properties.set(*k, *v);
        }
        Settings::with_env(move |key| env.get(key).cloned(), Arc::new(properties))
    }

    #[test]
    fn test_environment_wins_over_property() {
        let s = settings(
            &[("TESTSERVER_ENDPOINT", "http://env:8080")],
            &[("testserver.endpoint", "http://prop:8080")],
        );
        assert_eq!(s.lookup(&ENDPOINT).as_deref(), Some("http://env:8080"));
    }

    #[test]
    fn test_property_used_when_environment_absent() {
        let s = settings(&[], &[("testserver.user", "alice")]);
        assert_eq!(s.remote().user.as_deref(), Some("alice"));
        assert!(s.remote().endpoint.is_none());
    }

    #[test]
    fn test_blank_environment_falls_through() {
        let s = settings(
            &[("TESTSERVER_ENDPOINT", "  ")],
            &[("testserver.endpoint", "http://prop:8080")],
        );
        assert_eq!(s.lookup(&ENDPOINT).as_deref(), Some("http://prop:8080"));
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml("[codec]\nallow_plugins = true\n").unwrap();
        assert!(config.codec.allow_plugins);
        assert_eq!(config.remote.request_timeout_secs, 300);
        assert_eq!(config.remote.mode, ExecutionMode::Sync);
        assert!(config.local.follow_redirects);
    }

    #[test]
    fn test_properties_table() {
        let config = Config::from_toml(
            r#"
[remote]
mode = "async"
poll_interval_ms = 50

[properties]
"testserver.endpoint" = "http://localhost:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.remote.mode, ExecutionMode::Async);
        assert_eq!(config.remote.poll_interval_ms, 50);
        assert_eq!(
            config.properties.get("testserver.endpoint").map(String::as_str),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[remote\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_parse_assignment() {
        let (k, v) = Properties::parse_assignment("testserver.user=bob=1").unwrap();
        assert_eq!(k, "testserver.user");
        assert_eq!(v, "bob=1");
        assert!(Properties::parse_assignment("novalue").is_err());
        assert!(Properties::parse_assignment("=x").is_err());
    }

    #[test]
    fn test_password_hidden_in_debug() {
        let s = RemoteSettings {
            endpoint: None,
            user: Some("u".into()),
            password: Some("secret".into()),
        };
        assert!(!format!("{:?}", s).contains("secret"));
    }
}
