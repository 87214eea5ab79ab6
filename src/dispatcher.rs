use axum::Json;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::ack::{AckJob, AckQueue};
use crate::classify::{Classification, classify};
use crate::config::Config;
use crate::telegram::api::is_allowed;
use crate::telegram::parse_update;
use crate::telegram::types::Update;

const DEFAULT_MAX_BODY: usize = 1024 * 1024;

/// Handles one webhook delivery end to end.
///
/// Immutable once built, so a single instance is shared by every request.
/// The caller always gets `200 {"status":"ok"}` for anything that reaches
/// here: Telegram retries non-2xx deliveries, and a payload we cannot make
/// sense of will not improve on redelivery.
pub struct Dispatcher {
    test_ack: bool,
    allowed_users: Vec<i64>,
    max_body_bytes: usize,
    acks: Option<AckQueue>,
    classifier: fn(&Update) -> Classification,
}

/// What the dispatcher made of one parsed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub update_id: Option<i64>,
    pub classification: Classification,
    pub ack: Option<AckJob>,
}

impl Dispatcher {
    pub fn new(test_ack: bool) -> Self {
        Self {
            test_ack,
            allowed_users: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY,
            acks: None,
            classifier: classify,
        }
    }

    /// Build from config. Production never gets test acks, whatever the
    /// `[ack]` section says.
    pub fn from_config(config: &Config) -> Self {
        if config.ack.enabled && !config.test_ack_enabled() {
            tracing::warn!("test ack mode requested in production, forcing it off");
        }
        Self::new(config.test_ack_enabled())
            .with_allowed_users(config.telegram.allowed_users.clone())
            .with_max_body_bytes(config.server.max_body_bytes)
    }

    pub fn with_allowed_users(mut self, allowed_users: Vec<i64>) -> Self {
        self.allowed_users = allowed_users;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_acks(mut self, acks: AckQueue) -> Self {
        self.acks = Some(acks);
        self
    }

    #[cfg(test)]
    fn with_classifier(mut self, classifier: fn(&Update) -> Classification) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn test_ack(&self) -> bool {
        self.test_ack
    }

    /// Read, classify, acknowledge. Any reply goes to the ack worker after
    /// the response is built and is never awaited here.
    pub async fn handle(&self, headers: HeaderMap, body: Body) -> Response {
        check_content_type(&headers);

        let raw = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!("failed to read webhook body: {e}");
                return ok_response();
            }
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(&raw)));
        let response = ok_response();

        match outcome {
            Ok(Some(Dispatch { ack: Some(job), .. })) => {
                if let Some(ref acks) = self.acks {
                    acks.enqueue(job);
                } else {
                    tracing::warn!("ack decided but no ack worker is running");
                }
            }
            Ok(_) => {}
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!("webhook dispatch panicked: {msg}");
            }
        }

        response
    }

    /// Parse and classify a raw body. `None` means the payload was dropped.
    pub fn dispatch(&self, raw: &str) -> Option<Dispatch> {
        let update = parse_update(raw)?;
        let classification = (self.classifier)(&update);

        tracing::info!(
            update_id = ?update.update_id,
            kind = %classification.label,
            chat_id = ?classification.chat_id,
            "update received"
        );

        let ack = self.ack_for(&classification);
        Some(Dispatch {
            update_id: update.update_id,
            classification,
            ack,
        })
    }

    /// Reply only to humans, only when we know where to reply, and only
    /// when test ack mode is on.
    fn ack_for(&self, c: &Classification) -> Option<AckJob> {
        if !self.test_ack {
            return None;
        }
        // Two bots acking each other would never stop
        if c.sender_is_bot {
            tracing::debug!(chat_id = ?c.chat_id, "not acking a bot");
            return None;
        }
        let (Some(chat_id), Some(message_id)) = (c.chat_id, c.message_id) else {
            return None;
        };
        if !is_allowed(&self.allowed_users, c.sender_id) {
            tracing::info!(sender_id = ?c.sender_id, chat_id, "sender not on whitelist, no ack");
            return None;
        }
        Some(AckJob {
            chat_id,
            reply_to: Some(message_id),
            text: format!("✅ Received: {}", c.label),
        })
    }
}

pub fn ok_response() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// Warn on anything but `application/json`. Never rejects.
fn check_content_type(headers: &HeaderMap) {
    let value = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if !is_json_media_type(value) {
        tracing::warn!(
            content_type = value.unwrap_or("<missing>"),
            "unexpected webhook content-type, processing anyway"
        );
    }
}

fn is_json_media_type(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.split(';').next())
        .is_some_and(|mt| mt.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Label;

    const HUMAN_COMMAND: &str = r#"{"update_id":1,"message":{"message_id":5,"chat":{"id":42},"from":{"id":7,"is_bot":false},"text":"/help"}}"#;

    #[test]
    fn media_type_check() {
        assert!(is_json_media_type(Some("application/json")));
        assert!(is_json_media_type(Some("Application/JSON; charset=utf-8")));
        assert!(!is_json_media_type(Some("text/plain")));
        assert!(!is_json_media_type(None));
    }

    #[test]
    fn invalid_payload_dispatches_nothing() {
        let d = Dispatcher::new(true);
        assert!(d.dispatch("not valid json{{{").is_none());
    }

    #[test]
    fn classifies_command() {
        let d = Dispatcher::new(false);
        let out = d.dispatch(HUMAN_COMMAND).unwrap();
        assert_eq!(out.update_id, Some(1));
        assert_eq!(out.classification.label, Label::Command);
        assert_eq!(out.classification.chat_id, Some(42));
        assert!(out.ack.is_none());
    }

    #[test]
    fn ack_when_enabled() {
        let d = Dispatcher::new(true);
        let job = d.dispatch(HUMAN_COMMAND).unwrap().ack.unwrap();
        assert_eq!(job.chat_id, 42);
        assert_eq!(job.reply_to, Some(5));
        assert!(job.text.contains("command"));
    }

    #[test]
    fn never_ack_bots() {
        let d = Dispatcher::new(true);
        let bot = HUMAN_COMMAND.replace(r#""is_bot":false"#, r#""is_bot":true"#);
        assert!(d.dispatch(&bot).unwrap().ack.is_none());
    }

    #[test]
    fn no_ack_without_routing() {
        let d = Dispatcher::new(true);
        let out = d
            .dispatch(r#"{"message":{"message_id":5,"text":"hi"}}"#)
            .unwrap();
        assert!(out.ack.is_none());
        let out = d
            .dispatch(r#"{"message":{"chat":{"id":1},"text":"hi"}}"#)
            .unwrap();
        assert!(out.ack.is_none());
    }

    #[test]
    fn whitelist_gates_ack() {
        let d = Dispatcher::new(true).with_allowed_users(vec![99]);
        assert!(d.dispatch(HUMAN_COMMAND).unwrap().ack.is_none());
        let d = Dispatcher::new(true).with_allowed_users(vec![7]);
        assert!(d.dispatch(HUMAN_COMMAND).unwrap().ack.is_some());
    }

    #[tokio::test]
    async fn panic_in_dispatch_still_answers_ok() {
        fn exploding(_: &Update) -> Classification {
            panic!("classifier blew up");
        }
        let d = Dispatcher::new(true).with_classifier(exploding);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        let resp = d.handle(headers, Body::from(HUMAN_COMMAND)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[test]
    fn production_config_disables_ack() {
        let mut config = Config::default();
        config.ack.enabled = true;
        config.environment = crate::config::Environment::Production;
        let d = Dispatcher::from_config(&config);
        assert!(!d.test_ack());
        assert!(d.dispatch(HUMAN_COMMAND).unwrap().ack.is_none());
    }
}
