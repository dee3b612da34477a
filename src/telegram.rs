//! Outbound transport: a one-way deliver-to-chat sink over the Telegram
//! Bot API. Delivery is best-effort; failures are logged to stderr and
//! dropped, never retried or surfaced to the user.

use std::time::Duration;

use serde::Serialize;

use crate::catalog::PersonaCatalog;
use crate::config::env_optional;
use crate::events::SELECT_PREFIX;

const SEND_TIMEOUT_SECS: u64 = 30;
const REGISTER_TIMEOUT_SECS: u64 = 15;

// ── Outbound wire types ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct InlineKeyboardButton {
    pub(crate) text: String,
    pub(crate) callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct InlineKeyboard {
    pub(crate) inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// The single outbound message a dispatched event may produce.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingMessage {
    pub(crate) chat_id: i64,
    pub(crate) text: String,
    pub(crate) reply_markup: Option<InlineKeyboard>,
}

impl OutgoingMessage {
    pub(crate) fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_markup: None,
        }
    }

    pub(crate) fn with_keyboard(chat_id: i64, text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_markup: Some(keyboard),
        }
    }
}

/// One single-button row per persona, labeled by title, in catalog order.
pub(crate) fn persona_menu(catalog: &PersonaCatalog) -> InlineKeyboard {
    InlineKeyboard {
        inline_keyboard: catalog
            .iter()
            .map(|persona| {
                vec![InlineKeyboardButton {
                    text: persona.title.clone(),
                    callback_data: format!("{SELECT_PREFIX}{}", persona.id),
                }]
            })
            .collect(),
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────

pub(crate) struct TelegramSink {
    agent: ureq::Agent,
    base_url: Option<String>,
}

impl TelegramSink {
    /// Without TELEGRAM_TOKEN the sink still constructs; every delivery is
    /// then logged and dropped so the process keeps serving.
    pub(crate) fn from_env() -> Self {
        let base_url = env_optional("TELEGRAM_TOKEN").map(|token| {
            match env_optional("TELEGRAM_API_BASE") {
                Some(base) => format!("{base}/bot{token}"),
                None => format!("https://api.telegram.org/bot{token}"),
            }
        });
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(SEND_TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(SEND_TIMEOUT_SECS))
            .timeout_write(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build();
        Self { agent, base_url }
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub(crate) fn deliver(&self, msg: &OutgoingMessage) {
        let Some(base_url) = &self.base_url else {
            eprintln!("[telegram] TELEGRAM_TOKEN not set, message to {} dropped", msg.chat_id);
            return;
        };
        let mut payload = serde_json::json!({
            "chat_id": msg.chat_id,
            "text": msg.text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = &msg.reply_markup {
            match serde_json::to_value(keyboard) {
                Ok(markup) => {
                    payload["reply_markup"] = markup;
                }
                Err(err) => {
                    eprintln!("[telegram] reply_markup encode failed: {err}");
                }
            }
        }
        let url = format!("{base_url}/sendMessage");
        if let Err(err) = self
            .agent
            .post(&url)
            .set("content-type", "application/json")
            .send_json(payload)
        {
            eprintln!("[telegram] send to {} failed: {err}", msg.chat_id);
        }
    }

    /// Best-effort acknowledgment so the client's keyboard spinner clears.
    pub(crate) fn answer_callback(&self, callback_id: &str) {
        let Some(base_url) = &self.base_url else {
            return;
        };
        let url = format!("{base_url}/answerCallbackQuery");
        let payload = serde_json::json!({"callback_query_id": callback_id});
        if let Err(err) = self
            .agent
            .post(&url)
            .set("content-type", "application/json")
            .send_json(payload)
        {
            eprintln!("[telegram] answerCallbackQuery failed: {err}");
        }
    }

    /// Point the platform's webhook at `<public_base>/webhook`. Returns the
    /// raw API response body.
    pub(crate) fn register_webhook(&self, public_base: &url::Url) -> Result<String, Box<dyn std::error::Error>> {
        let Some(base_url) = &self.base_url else {
            return Err("TELEGRAM_TOKEN not set".into());
        };
        let webhook_url = format!("{}/webhook", public_base.as_str().trim_end_matches('/'));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(REGISTER_TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(REGISTER_TIMEOUT_SECS))
            .build();
        let response = agent
            .post(&format!("{base_url}/setWebhook"))
            .set("content-type", "application/json")
            .send_json(serde_json::json!({"url": webhook_url}))?;
        Ok(response.into_string()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PersonaCatalog, builtin_personas};
    use serde_json::json;

    #[test]
    fn persona_menu_one_button_per_persona() {
        let catalog = PersonaCatalog::from_personas(builtin_personas());
        let menu = persona_menu(&catalog);
        assert_eq!(menu.inline_keyboard.len(), 3);
        assert!(menu.inline_keyboard.iter().all(|row| row.len() == 1));

        let labels: Vec<&str> = menu
            .inline_keyboard
            .iter()
            .map(|row| row[0].text.as_str())
            .collect();
        assert!(labels.contains(&"Альберт Эйнштейн"));
        assert!(labels.contains(&"Аристотель"));
        assert!(labels.contains(&"Амир Темур"));

        let actions: Vec<&str> = menu
            .inline_keyboard
            .iter()
            .map(|row| row[0].callback_data.as_str())
            .collect();
        assert!(actions.contains(&"set:einstein"));
        assert!(actions.contains(&"set:aristotle"));
        assert!(actions.contains(&"set:temur"));
    }

    #[test]
    fn persona_menu_empty_catalog() {
        let catalog = PersonaCatalog::from_personas(Vec::new());
        assert!(persona_menu(&catalog).inline_keyboard.is_empty());
    }

    #[test]
    fn keyboard_serializes_to_inline_keyboard_shape() {
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Аристотель".to_string(),
                callback_data: "set:aristotle".to_string(),
            }]],
        };
        assert_eq!(
            serde_json::to_value(&keyboard).unwrap(),
            json!({
                "inline_keyboard": [[{"text": "Аристотель", "callback_data": "set:aristotle"}]]
            })
        );
    }
}
