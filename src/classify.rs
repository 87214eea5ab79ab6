use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::telegram::types::{TgMessage, Update, UpdateKind};

/// Short tag describing what an update is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    EditedMessage,
    ChannelPost,
    CallbackQuery,
    Voice,
    Command,
    Text,
    Other,
    Unknown,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::EditedMessage => "edited_message",
            Label::ChannelPost => "channel_post",
            Label::CallbackQuery => "callback_query",
            Label::Voice => "voice message",
            Label::Command => "command",
            Label::Text => "text message",
            Label::Other => "other",
            Label::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing facts pulled out of one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: Label,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub sender_id: Option<i64>,
    /// Missing sender counts as human.
    pub sender_is_bot: bool,
}

pub fn classify(update: &Update) -> Classification {
    let sender = update.sender();
    Classification {
        label: label(update),
        chat_id: update.chat_id(),
        message_id: update.message_id(),
        sender_id: sender.and_then(|u| u.id),
        sender_is_bot: sender.is_some_and(|u| u.is_bot),
    }
}

pub fn label(update: &Update) -> Label {
    match update.kind() {
        UpdateKind::EditedMessage(_) => Label::EditedMessage,
        UpdateKind::ChannelPost(_) => Label::ChannelPost,
        UpdateKind::CallbackQuery(_) => Label::CallbackQuery,
        UpdateKind::Unknown => Label::Unknown,
        UpdateKind::Message(msg) => message_label(msg),
    }
}

fn message_label(msg: &TgMessage) -> Label {
    if msg.voice.is_some() {
        return Label::Voice;
    }
    if msg.has_entity("bot_command") {
        return Label::Command;
    }
    match msg.text.as_deref() {
        // Not every send path annotates commands with an entity
        Some(text) if looks_like_command(text) => Label::Command,
        Some(text) if !text.is_empty() => Label::Text,
        _ => Label::Other,
    }
}

/// `/name`, optional `@bot` suffix, optional space-separated arguments.
/// Arguments may run over several lines.
pub fn looks_like_command(text: &str) -> bool {
    static COMMAND_RE: OnceLock<Regex> = OnceLock::new();
    let re = COMMAND_RE
        .get_or_init(|| Regex::new(r"(?s)^/[A-Za-z_]+(@\w+)?( .*)?$").unwrap());
    re.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::parse_update;

    fn label_of(json: &str) -> Label {
        label(&parse_update(json).unwrap())
    }

    #[test]
    fn command_shapes() {
        assert!(looks_like_command("/start"));
        assert!(looks_like_command("/start@mybot extra args"));
        assert!(looks_like_command("/set_lang en"));
        assert!(looks_like_command("/not a command"));
        assert!(!looks_like_command("/5.3"));
        assert!(!looks_like_command("https://x/y"));
        assert!(!looks_like_command("/usr/bin"));
        assert!(!looks_like_command("/start@"));
        assert!(!looks_like_command("start"));
        assert!(!looks_like_command(" /start"));
        assert!(!looks_like_command("/"));
        assert!(!looks_like_command("/start\nmore"));
    }

    #[test]
    fn multiline_arguments_are_still_a_command() {
        assert!(looks_like_command("/note buy milk"));
        assert!(looks_like_command("/note buy milk\nand eggs"));
        assert_eq!(
            label_of(r#"{"message":{"text":"/note buy milk\nand eggs"}}"#),
            Label::Command
        );
    }

    #[test]
    fn precedence_is_fixed() {
        assert_eq!(
            label_of(r#"{"message":{"text":"hi"},"edited_message":{},"channel_post":{}}"#),
            Label::EditedMessage
        );
        assert_eq!(
            label_of(r#"{"channel_post":{},"callback_query":{}}"#),
            Label::ChannelPost
        );
        assert_eq!(
            label_of(r#"{"message":{"text":"hi"},"callback_query":{"id":"1"}}"#),
            Label::CallbackQuery
        );
    }

    #[test]
    fn no_branch_is_unknown() {
        assert_eq!(label_of("{}"), Label::Unknown);
        assert_eq!(label_of(r#"{"update_id":9,"poll":{}}"#), Label::Unknown);
        assert_eq!(label_of(r#"{"message":null}"#), Label::Unknown);
    }

    #[test]
    fn voice_wins_over_text() {
        assert_eq!(label_of(r#"{"message":{"voice":{"file_id":"x"}}}"#), Label::Voice);
        assert_eq!(
            label_of(r#"{"message":{"voice":{},"text":"/start","entities":[{"type":"bot_command"}]}}"#),
            Label::Voice
        );
    }

    #[test]
    fn command_by_entity_or_shape() {
        assert_eq!(
            label_of(r#"{"message":{"text":"go","entities":[{"type":"bot_command","offset":0,"length":2}]}}"#),
            Label::Command
        );
        assert_eq!(label_of(r#"{"message":{"text":"/start"}}"#), Label::Command);
        assert_eq!(
            label_of(r#"{"message":{"text":"/start@mybot extra args"}}"#),
            Label::Command
        );
        assert_eq!(
            label_of(r#"{"message":{"text":"bold","entities":[{"type":"bold"}]}}"#),
            Label::Text
        );
    }

    #[test]
    fn text_and_other() {
        assert_eq!(label_of(r#"{"message":{"text":"/5.3"}}"#), Label::Text);
        assert_eq!(label_of(r#"{"message":{"text":""}}"#), Label::Other);
        assert_eq!(label_of(r#"{"message":{"message_id":1}}"#), Label::Other);
    }

    #[test]
    fn chat_id_from_callback_message() {
        let u = parse_update(
            r#"{"update_id":1,"callback_query":{"id":"q","from":{"id":3,"is_bot":false},"message":{"message_id":8,"chat":{"id":77}}}}"#,
        )
        .unwrap();
        let c = classify(&u);
        assert_eq!(c.label, Label::CallbackQuery);
        assert_eq!(c.chat_id, Some(77));
        assert_eq!(c.message_id, Some(8));
        assert_eq!(c.sender_id, Some(3));
    }

    #[test]
    fn chat_id_prefers_message() {
        let u = parse_update(
            r#"{"message":{"chat":{"id":1}},"edited_message":{"chat":{"id":2}}}"#,
        )
        .unwrap();
        let c = classify(&u);
        assert_eq!(c.label, Label::EditedMessage);
        assert_eq!(c.chat_id, Some(1));
    }

    #[test]
    fn missing_chat_is_none() {
        let c = classify(&parse_update(r#"{"message":{"text":"hi"}}"#).unwrap());
        assert_eq!(c.chat_id, None);
        assert!(!c.sender_is_bot);
    }

    #[test]
    fn labels_render() {
        assert_eq!(Label::Voice.to_string(), "voice message");
        assert_eq!(Label::Text.as_str(), "text message");
        assert_eq!(Label::EditedMessage.as_str(), "edited_message");
    }
}
