//! Inbound webhook payloads, parsed into typed structs and classified into
//! tagged events. Anything that fails the parse collapses to `Ignored` and
//! becomes a no-op downstream; there is deliberately no logging distinction
//! between an ignored shape and a handled event.

use serde::Deserialize;

pub(crate) const SELECT_PREFIX: &str = "set:";

pub(crate) const CMD_START: &str = "/start";
pub(crate) const CMD_SWITCH: &str = "/switch";
pub(crate) const CMD_LIST: &str = "/listpersonas";

// ── Wire structs ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct WebhookUpdate {
    #[serde(default)]
    pub(crate) callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub(crate) message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) data: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<Box<IncomingMessage>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncomingMessage {
    pub(crate) chat: Chat,
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) from: Option<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Chat {
    pub(crate) id: i64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct User {
    pub(crate) id: i64,
}

// ── Classified events ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InboundEvent {
    /// Inline-keyboard selection carrying an embedded persona id.
    PersonaSelected { chat_id: i64, persona_id: String },
    Start { chat_id: i64 },
    Switch { chat_id: i64 },
    List { chat_id: i64 },
    /// Plain conversational message.
    Say { chat_id: i64, text: String },
    Ignored,
}

pub(crate) fn parse_update(payload: &serde_json::Value) -> Option<WebhookUpdate> {
    serde_json::from_value(payload.clone()).ok()
}

/// Classification precedence: selection callback, then commands, then plain
/// text. A callback without a usable chat or a message without text is
/// silently ignored.
pub(crate) fn classify(update: &WebhookUpdate) -> InboundEvent {
    if let Some(cb) = &update.callback_query {
        let Some(chat_id) = cb.message.as_ref().map(|m| m.chat.id) else {
            return InboundEvent::Ignored;
        };
        let Some(persona_id) = cb
            .data
            .as_deref()
            .and_then(|data| data.strip_prefix(SELECT_PREFIX))
        else {
            return InboundEvent::Ignored;
        };
        return InboundEvent::PersonaSelected {
            chat_id,
            persona_id: persona_id.to_string(),
        };
    }

    if let Some(msg) = &update.message {
        let chat_id = msg.chat.id;
        let Some(text) = msg.text.clone() else {
            return InboundEvent::Ignored;
        };
        if text == CMD_START {
            return InboundEvent::Start { chat_id };
        }
        if text == CMD_SWITCH {
            return InboundEvent::Switch { chat_id };
        }
        if text.starts_with(CMD_LIST) {
            return InboundEvent::List { chat_id };
        }
        return InboundEvent::Say { chat_id, text };
    }

    InboundEvent::Ignored
}

pub(crate) fn classify_update(payload: &serde_json::Value) -> InboundEvent {
    match parse_update(payload) {
        Some(update) => classify(&update),
        None => InboundEvent::Ignored,
    }
}

/// Callback id for best-effort `answerCallbackQuery` acknowledgment.
pub(crate) fn callback_ack_id(payload: &serde_json::Value) -> Option<String> {
    parse_update(payload)?.callback_query?.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_selection_callback() {
        let payload = json!({
            "callback_query": {
                "id": "cb-1",
                "data": "set:aristotle",
                "message": {"chat": {"id": 42}}
            }
        });
        assert_eq!(
            classify_update(&payload),
            InboundEvent::PersonaSelected {
                chat_id: 42,
                persona_id: "aristotle".to_string()
            }
        );
        assert_eq!(callback_ack_id(&payload).as_deref(), Some("cb-1"));
    }

    #[test]
    fn callback_without_chat_is_ignored() {
        let payload = json!({"callback_query": {"id": "cb-2", "data": "set:einstein"}});
        assert_eq!(classify_update(&payload), InboundEvent::Ignored);
    }

    #[test]
    fn callback_with_foreign_data_is_ignored() {
        let payload = json!({
            "callback_query": {
                "id": "cb-3",
                "data": "page:2",
                "message": {"chat": {"id": 42}}
            }
        });
        assert_eq!(classify_update(&payload), InboundEvent::Ignored);
    }

    #[test]
    fn callback_takes_precedence_over_message() {
        let payload = json!({
            "callback_query": {
                "data": "set:temur",
                "message": {"chat": {"id": 1}}
            },
            "message": {"chat": {"id": 2}, "text": "/start"}
        });
        assert_eq!(
            classify_update(&payload),
            InboundEvent::PersonaSelected {
                chat_id: 1,
                persona_id: "temur".to_string()
            }
        );
    }

    #[test]
    fn classify_commands() {
        let start = json!({"message": {"chat": {"id": 7}, "text": "/start"}});
        let switch = json!({"message": {"chat": {"id": 7}, "text": "/switch"}});
        let list = json!({"message": {"chat": {"id": 7}, "text": "/listpersonas"}});
        assert_eq!(classify_update(&start), InboundEvent::Start { chat_id: 7 });
        assert_eq!(classify_update(&switch), InboundEvent::Switch { chat_id: 7 });
        assert_eq!(classify_update(&list), InboundEvent::List { chat_id: 7 });
    }

    #[test]
    fn list_command_matches_as_prefix() {
        let payload = json!({"message": {"chat": {"id": 7}, "text": "/listpersonas extra"}});
        assert_eq!(classify_update(&payload), InboundEvent::List { chat_id: 7 });
    }

    #[test]
    fn start_with_suffix_is_conversational() {
        let payload = json!({"message": {"chat": {"id": 7}, "text": "/started yet?"}});
        assert_eq!(
            classify_update(&payload),
            InboundEvent::Say {
                chat_id: 7,
                text: "/started yet?".to_string()
            }
        );
    }

    #[test]
    fn plain_message_is_say() {
        let payload = json!({
            "message": {"chat": {"id": 42}, "text": "Hello", "from": {"id": 5}}
        });
        assert_eq!(
            classify_update(&payload),
            InboundEvent::Say {
                chat_id: 42,
                text: "Hello".to_string()
            }
        );
    }

    #[test]
    fn message_without_text_is_ignored() {
        let payload = json!({"message": {"chat": {"id": 42}}});
        assert_eq!(classify_update(&payload), InboundEvent::Ignored);
    }

    #[test]
    fn unknown_shapes_are_ignored() {
        assert_eq!(classify_update(&json!({})), InboundEvent::Ignored);
        assert_eq!(classify_update(&json!({"edited_message": {"x": 1}})), InboundEvent::Ignored);
        assert_eq!(classify_update(&json!("just a string")), InboundEvent::Ignored);
        assert_eq!(classify_update(&json!({"message": "not an object"})), InboundEvent::Ignored);
    }
}
