//! Update dispatcher: classifies one inbound event, resolves persona state,
//! and produces at most one outbound message. The dispatcher itself holds no
//! state across events; assignments are re-read from the store every time so
//! concurrent deliveries resolve to whatever write lands last.

use std::path::Path;

use crate::catalog::PersonaCatalog;
use crate::events::{InboundEvent, classify_update};
use crate::gateway::CompletionGateway;
use crate::store::{active_persona, set_active_persona};
use crate::telegram::{OutgoingMessage, persona_menu};

pub(crate) const MENU_START_TEXT: &str = "Выбери личность:";
pub(crate) const MENU_SWITCH_TEXT: &str = "Выбор личности:";
pub(crate) const LIST_EMPTY_TEXT: &str = "Нет персон.";
pub(crate) const NO_PERSONA_TEXT: &str = "Личность не выбрана. Нажми /switch.";

pub(crate) struct Dispatcher<'a> {
    pub(crate) catalog: &'a PersonaCatalog,
    pub(crate) db_path: &'a Path,
    pub(crate) gateway: &'a dyn CompletionGateway,
}

impl Dispatcher<'_> {
    /// One inbound payload in, zero or one outbound message out. Unknown
    /// shapes and unknown persona selections fall through silently.
    pub(crate) fn handle_update(&self, payload: &serde_json::Value) -> Option<OutgoingMessage> {
        match classify_update(payload) {
            InboundEvent::PersonaSelected { chat_id, persona_id } => {
                self.select_persona(chat_id, &persona_id)
            }
            InboundEvent::Start { chat_id } => Some(OutgoingMessage::with_keyboard(
                chat_id,
                MENU_START_TEXT,
                persona_menu(self.catalog),
            )),
            InboundEvent::Switch { chat_id } => Some(OutgoingMessage::with_keyboard(
                chat_id,
                MENU_SWITCH_TEXT,
                persona_menu(self.catalog),
            )),
            InboundEvent::List { chat_id } => Some(self.list_personas(chat_id)),
            InboundEvent::Say { chat_id, text } => self.converse(chat_id, &text),
            InboundEvent::Ignored => None,
        }
    }

    fn select_persona(&self, chat_id: i64, persona_id: &str) -> Option<OutgoingMessage> {
        // Ids that are not in the catalog are dropped without a reply.
        let persona = self.catalog.get(persona_id)?;
        if let Err(err) = set_active_persona(self.db_path, chat_id, persona_id) {
            eprintln!("[dispatch] set_active_persona failed: {err}");
            return None;
        }
        Some(OutgoingMessage::text(
            chat_id,
            format!("Выбран: <b>{}</b>", persona.title),
        ))
    }

    fn list_personas(&self, chat_id: i64) -> OutgoingMessage {
        if self.catalog.is_empty() {
            return OutgoingMessage::text(chat_id, LIST_EMPTY_TEXT);
        }
        let listing = self
            .catalog
            .iter()
            .map(|p| format!("<b>{}</b> — {}", p.id, p.title))
            .collect::<Vec<_>>()
            .join("\n");
        OutgoingMessage::text(chat_id, listing)
    }

    fn converse(&self, chat_id: i64, text: &str) -> Option<OutgoingMessage> {
        let assigned = match active_persona(self.db_path, chat_id) {
            Ok(assigned) => assigned,
            Err(err) => {
                eprintln!("[dispatch] active_persona failed: {err}");
                return None;
            }
        };
        let Some(persona_id) = assigned else {
            return Some(OutgoingMessage::text(chat_id, NO_PERSONA_TEXT));
        };
        let Some(persona) = self.catalog.get(&persona_id) else {
            // Dangling assignment (persona removed outside the bot): steer
            // the user back to the menu instead of calling the model.
            eprintln!("[dispatch] assignment for chat {chat_id} references unknown persona '{persona_id}'");
            return Some(OutgoingMessage::text(chat_id, NO_PERSONA_TEXT));
        };
        let reply = self.gateway.complete(&persona.system_prompt, text);
        Some(OutgoingMessage::text(chat_id, reply))
    }
}
