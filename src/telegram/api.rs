use anyhow::{Context, Result};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

use super::types::{ApiResponse, TgMessage, WebhookInfo};

/// Outbound message capability the dispatcher depends on.
pub trait MessageSender: Send + Sync + 'static {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub struct TelegramBot {
    client: Client,
    base_url: String,
}

impl TelegramBot {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}/"))
    }

    /// Point the client at another Bot API server (local bot-api, tests).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, base_url })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp: ApiResponse<T> = self
            .client
            .post(format!("{}{method}", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("calling Telegram {method}"))?
            .json()
            .await
            .with_context(|| format!("parsing {method} response"))?;

        if !resp.ok {
            anyhow::bail!(
                "{method} failed: {}",
                resp.description.unwrap_or_default()
            );
        }

        resp.result.with_context(|| format!("no result in {method} response"))
    }

    pub async fn send(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> Result<TgMessage> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(id) = reply_to {
            body["reply_parameters"] = serde_json::json!({
                "message_id": id,
                "allow_sending_without_reply": true,
            });
        }
        self.call("sendMessage", body).await
    }

    /// Register `url` as the webhook. Telegram echoes `secret_token` back in
    /// the `X-Telegram-Bot-Api-Secret-Token` header of every delivery.
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let mut body = serde_json::json!({
            "url": url,
            "allowed_updates": ["message", "edited_message", "channel_post", "callback_query"],
        });
        if let Some(secret) = secret_token {
            body["secret_token"] = serde_json::Value::String(secret.to_string());
        }
        let _: bool = self.call("setWebhook", body).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self
            .call("deleteWebhook", serde_json::json!({ "drop_pending_updates": false }))
            .await?;
        Ok(())
    }

    pub async fn webhook_info(&self) -> Result<WebhookInfo> {
        self.call("getWebhookInfo", serde_json::json!({})).await
    }
}

impl MessageSender for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> Result<()> {
        self.send(chat_id, text, reply_to).await.map(|_| ())
    }
}

/// Whitelist check. An empty list lets everyone through.
pub fn is_allowed(allowed_users: &[i64], user_id: Option<i64>) -> bool {
    allowed_users.is_empty() || user_id.is_some_and(|id| allowed_users.contains(&id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_whitelist_allows_all() {
        assert!(is_allowed(&[], Some(5)));
        assert!(is_allowed(&[], None));
    }

    #[test]
    fn whitelist_filters() {
        assert!(is_allowed(&[1, 7], Some(7)));
        assert!(!is_allowed(&[1, 7], Some(8)));
        assert!(!is_allowed(&[1, 7], None));
    }
}
