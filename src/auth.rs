use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credential store — environment first, then credentials.toml
#[derive(Debug, Default)]
pub struct AuthStore {
    credentials: Credentials,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Credentials {
    telegram: Option<TelegramCreds>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TelegramCreds {
    bot_token: Option<String>,
    /// Shared secret Telegram sends back in X-Telegram-Bot-Api-Secret-Token
    webhook_secret: Option<String>,
}

impl AuthStore {
    /// Load credentials from the default location (~/.config/tgrelay/credentials.toml)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::credentials_path())
    }

    /// Load the `credentials.toml` that sits next to `config_path`.
    pub fn load_beside(config_path: &Path) -> Result<Self> {
        Self::load_from(&Self::path_beside(config_path))
    }

    pub fn path_beside(config_path: &Path) -> PathBuf {
        config_path.with_file_name("credentials.toml")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let credentials = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Credentials::default()
        };
        Ok(Self { credentials })
    }

    pub fn telegram_bot_token(&self) -> Option<String> {
        non_empty(std::env::var("TELEGRAM_BOT_TOKEN").ok()).or_else(|| {
            self.credentials
                .telegram
                .as_ref()
                .and_then(|t| non_empty(t.bot_token.clone()))
        })
    }

    pub fn webhook_secret(&self) -> Option<String> {
        non_empty(std::env::var("TELEGRAM_WEBHOOK_SECRET").ok()).or_else(|| {
            self.credentials
                .telegram
                .as_ref()
                .and_then(|t| non_empty(t.webhook_secret.clone()))
        })
    }

    fn credentials_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tgrelay")
            .join("credentials.toml")
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Mask a secret for display: keep a short prefix and suffix.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".into()
    }
}
