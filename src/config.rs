use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration (from config.toml + environment)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment. `production` forces test acks off.
    pub environment: Environment,
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub ack: AckConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub webhook_path: String,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            webhook_path: "/webhook".into(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Telegram user ids allowed to get replies. Empty = everyone.
    pub allowed_users: Vec<i64>,
    /// Public HTTPS base used by `set-webhook` when no --url is given
    pub public_url: Option<String>,
}

/// Test acknowledgment mode: reply to every classified update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AckConfig {
    pub enabled: bool,
    pub queue_capacity: usize,
    pub send_timeout_secs: u64,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: 256,
            send_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

impl Config {
    /// Load config from default path (~/.config/tgrelay/config.toml)
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path();
        let config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides(|k| std::env::var(k).ok()))
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::read(path)?.with_env_overrides(|k| std::env::var(k).ok()))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tgrelay")
            .join("config.toml")
    }

    /// Apply `APP_ENV`, `TEST_ACK`, `PORT` and `ALLOWED_USERS`. Unparseable
    /// values are ignored with a warning.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("APP_ENV") {
            match Environment::parse(&v) {
                Some(env) => self.environment = env,
                None => tracing::warn!("ignoring unknown APP_ENV={v}"),
            }
        }
        if let Some(v) = var("TEST_ACK") {
            self.ack.enabled = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = var("PORT") {
            match v.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT={v}"),
            }
        }
        if let Some(v) = var("ALLOWED_USERS") {
            self.telegram.allowed_users = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!("ignoring invalid user id in ALLOWED_USERS: {s}");
                        None
                    }
                })
                .collect();
        }
        self
    }

    /// Whether test acks may run. Production always says no.
    pub fn test_ack_enabled(&self) -> bool {
        self.ack.enabled && self.environment != Environment::Production
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.environment, Environment::Development);
        assert_eq!(c.server.webhook_path, "/webhook");
        assert!(!c.test_ack_enabled());
    }

    #[test]
    fn production_forces_ack_off() {
        let c = Config::default().with_env_overrides(env(&[("TEST_ACK", "1"), ("APP_ENV", "production")]));
        assert!(c.ack.enabled);
        assert!(!c.test_ack_enabled());

        let c = Config::default().with_env_overrides(env(&[("TEST_ACK", "true")]));
        assert!(c.test_ack_enabled());
    }

    #[test]
    fn env_overrides() {
        let c = Config::default().with_env_overrides(env(&[
            ("PORT", "9000"),
            ("ALLOWED_USERS", "1, 2,oops,3"),
            ("APP_ENV", "weird"),
        ]));
        assert_eq!(c.server.port, 9000);
        assert_eq!(c.telegram.allowed_users, vec![1, 2, 3]);
        assert_eq!(c.environment, Environment::Development);
    }

    #[test]
    fn parses_toml() {
        let c: Config = toml::from_str(
            r#"
            environment = "production"
            [server]
            port = 8443
            [ack]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(c.environment, Environment::Production);
        assert_eq!(c.server.port, 8443);
        assert_eq!(c.server.bind, "0.0.0.0");
        assert!(!c.test_ack_enabled());
    }
}
