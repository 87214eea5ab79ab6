use serde::Deserialize;
use serde::de::IgnoredAny;

/// One webhook delivery. Every branch is optional; Telegram populates at most one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Update {
    pub update_id: Option<i64>,
    pub message: Option<TgMessage>,
    pub edited_message: Option<TgMessage>,
    pub channel_post: Option<TgMessage>,
    pub callback_query: Option<CallbackQuery>,
}

/// Which kind of event an update carries, in classification precedence.
#[derive(Debug, Clone, Copy)]
pub enum UpdateKind<'a> {
    EditedMessage(&'a TgMessage),
    ChannelPost(&'a TgMessage),
    CallbackQuery(&'a CallbackQuery),
    Message(&'a TgMessage),
    Unknown,
}

impl Update {
    /// Pick the populated branch. If malformed input fills several, the
    /// order is edited message, channel post, callback query, message.
    pub fn kind(&self) -> UpdateKind<'_> {
        if let Some(ref m) = self.edited_message {
            UpdateKind::EditedMessage(m)
        } else if let Some(ref m) = self.channel_post {
            UpdateKind::ChannelPost(m)
        } else if let Some(ref q) = self.callback_query {
            UpdateKind::CallbackQuery(q)
        } else if let Some(ref m) = self.message {
            UpdateKind::Message(m)
        } else {
            UpdateKind::Unknown
        }
    }

    /// Message-shaped branches in routing order. The callback query's
    /// embedded message comes last since it sits one level deeper.
    fn routing_messages(&self) -> impl Iterator<Item = &TgMessage> {
        [
            self.message.as_ref(),
            self.edited_message.as_ref(),
            self.channel_post.as_ref(),
            self.callback_query.as_ref().and_then(|q| q.message.as_ref()),
        ]
        .into_iter()
        .flatten()
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.routing_messages()
            .find_map(|m| m.chat.as_ref().map(|c| c.id))
    }

    pub fn message_id(&self) -> Option<i64> {
        self.routing_messages().find_map(|m| m.message_id)
    }

    /// Who sent the update. Callback queries carry their own `from`.
    pub fn sender(&self) -> Option<&User> {
        [
            self.message.as_ref().and_then(|m| m.from.as_ref()),
            self.edited_message.as_ref().and_then(|m| m.from.as_ref()),
            self.channel_post.as_ref().and_then(|m| m.from.as_ref()),
            self.callback_query.as_ref().and_then(|q| q.from.as_ref()),
        ]
        .into_iter()
        .flatten()
        .next()
    }
}

// Only fields that classification or routing read are typed. Everything
// else is skipped, so an odd value there cannot sink the whole update.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TgMessage {
    pub message_id: Option<i64>,
    pub chat: Option<Chat>,
    pub from: Option<User>,
    pub text: Option<String>,
    /// Voice note descriptor; only its presence matters.
    pub voice: Option<IgnoredAny>,
    pub entities: Option<Vec<MessageEntity>>,
}

impl TgMessage {
    pub fn has_entity(&self, kind: &str) -> bool {
        self.entities
            .as_deref()
            .is_some_and(|es| es.iter().any(|e| e.kind == kind))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub from: Option<User>,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: Option<i64>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// Subset of `getWebhookInfo` we report on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookInfo {
    pub url: String,
    pub pending_update_count: u64,
    pub last_error_date: Option<i64>,
    pub last_error_message: Option<String>,
}
