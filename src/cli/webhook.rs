use anyhow::{Context, Result};
use colored::Colorize;

use crate::auth::AuthStore;
use crate::config::Config;
use crate::telegram::TelegramBot;

fn bot(auth: &AuthStore) -> Result<TelegramBot> {
    let token = auth.telegram_bot_token().context(
        "Telegram bot token not configured. Set TELEGRAM_BOT_TOKEN or add to credentials.toml",
    )?;
    TelegramBot::new(&token)
}

/// Full webhook URL: explicit `--url` wins, else public_url + webhook_path.
pub fn resolve_url(config: &Config, url: Option<&str>) -> Result<String> {
    if let Some(url) = url {
        return Ok(url.to_string());
    }
    let base = config
        .telegram
        .public_url
        .as_deref()
        .context("no --url given and telegram.public_url is not set")?;
    Ok(format!(
        "{}{}",
        base.trim_end_matches('/'),
        config.server.webhook_path
    ))
}

pub async fn set(config: &Config, auth: &AuthStore, url: Option<&str>) -> Result<()> {
    let url = resolve_url(config, url)?;
    if !url.starts_with("https://") {
        anyhow::bail!("Telegram only delivers webhooks over HTTPS: {url}");
    }
    let secret = auth.webhook_secret();
    bot(auth)?.set_webhook(&url, secret.as_deref()).await?;
    println!("{} webhook set to {}", "✓".green(), url.cyan());
    if secret.is_none() {
        eprintln!("{}", "No secret token registered, deliveries will be unauthenticated".yellow());
    }
    Ok(())
}

pub async fn delete(auth: &AuthStore) -> Result<()> {
    bot(auth)?.delete_webhook().await?;
    println!("{} webhook removed", "✓".green());
    Ok(())
}

pub async fn info(auth: &AuthStore) -> Result<()> {
    let info = bot(auth)?.webhook_info().await?;
    if info.url.is_empty() {
        println!("Webhook: {}", "not set".yellow());
    } else {
        println!("Webhook: {}", info.url.cyan());
    }
    println!("Pending updates: {}", info.pending_update_count);
    if let Some(msg) = info.last_error_message {
        let when = info
            .last_error_date
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "unknown time".into());
        println!("Last error: {} ({})", msg.red(), when.dimmed());
    }
    Ok(())
}
