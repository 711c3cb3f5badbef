//! Configuration management

use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::AdapterDeclaration;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Address to bind to
    pub address: String,
    /// Port to listen on
    pub port: u16,
    /// PEM certificate chain; TLS is enabled when set together with `key`
    pub cert: Option<String>,
    /// PEM private key matching `cert`
    pub key: Option<String>,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Input adapter declarations
    pub inputs: Vec<AdapterDeclaration>,
    /// Output adapter declarations
    pub outputs: Vec<AdapterDeclaration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_files: Vec::new(),
            address: "127.0.0.1".to_string(),
            port: 8443,
            cert: None,
            key: None,
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024, // 1MB
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

/// Certificate and key file pair for the HTTPS listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM certificate chain
    pub cert: PathBuf,
    /// PEM private key
    pub key: PathBuf,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
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

        figment = figment.merge(Env::prefixed("AUTH_MUX_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);
            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand `${VAR}` and `${VAR:-default}` in TLS paths and every string
    /// of every adapter config body
    fn expand_env_vars(&mut self) {
        for file in [&mut self.cert, &mut self.key].into_iter().flatten() {
            *file = expand_string(file);
        }

        for declaration in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            expand_value(&mut declaration.config);
        }
    }

    fn validate(&self) -> Result<()> {
        self.tls()?;
        if self.max_body_size == 0 {
            return Err(Error::Config("max_body_size must be positive".to_string()));
        }
        Ok(())
    }

    /// TLS files, if HTTPS is configured
    ///
    /// # Errors
    ///
    /// Returns an error if only one of `cert` and `key` is set.
    pub fn tls(&self) -> Result<Option<TlsFiles>> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        match (non_empty(&self.cert), non_empty(&self.key)) {
            (Some(cert), Some(key)) => Ok(Some(TlsFiles {
                cert: PathBuf::from(expand_home(&cert)),
                key: PathBuf::from(expand_home(&key)),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::Config("cert is set but key is not".to_string())),
            (None, Some(_)) => Err(Error::Config("key is set but cert is not".to_string())),
        }
    }

    /// Resolve `address:port` to a socket address
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not resolve.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::Config(format!(
                    "Address {}:{} did not resolve",
                    self.address, self.port
                ))
            })
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

fn env_var_pattern() -> &'static Regex {
    static ENV_VAR_RE: OnceLock<Regex> = OnceLock::new();
    // Pattern: ${VAR} or ${VAR:-default}
    ENV_VAR_RE.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap())
}

/// Expand environment variables in a string
fn expand_string(value: &str) -> String {
    env_var_pattern()
        .replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
}

fn expand_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = expand_string(s),
        Value::Array(items) => items.iter_mut().for_each(expand_value),
        Value::Object(map) => map.values_mut().for_each(expand_value),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Serialize Duration to human-readable string (e.g., "30s", "250ms")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration (e.g., "30s", "5m", "100ms", or bare seconds)
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the value cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => return Ok(Duration::from_secs(secs)),
            Raw::Text(s) => s,
        };
        let s = s.trim();

        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| Duration::from_secs(h * 3600))
                .map_err(serde::de::Error::custom)
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
