//! Persona catalog: compile-time built-ins merged with durable rows.
//!
//! Built-ins exist in code only as defaults and documentation; once seeded,
//! the durable row wins on every key collision, so edits made directly in
//! the database stick across restarts.

use std::collections::BTreeMap;

use crate::store::BotDb;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PersonaOrigin {
    BuiltIn,
    Registered {
        created_by: Option<i64>,
        created_at: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Persona {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) system_prompt: String,
    pub(crate) origin: PersonaOrigin,
}

impl Persona {
    fn builtin(id: &str, title: &str, system_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            system_prompt: system_prompt.to_string(),
            origin: PersonaOrigin::BuiltIn,
        }
    }
}

pub(crate) fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona::builtin(
            "einstein",
            "Альберт Эйнштейн",
            "Ты — Альберт Эйнштейн. Объясняй просто, используй аналогии.",
        ),
        Persona::builtin(
            "aristotle",
            "Аристотель",
            "Ты — Аристотель. Говори мудро, логично, используй тезисы.",
        ),
        Persona::builtin(
            "temur",
            "Амир Темур",
            "Ты — Амир Темур. Отвечай уверенно, кратко и стратегически.",
        ),
    ]
}

/// In-memory persona lookup, constructed once at startup and passed by
/// reference to the dispatcher. Reloading via `load` is safe and idempotent.
#[derive(Debug, Clone)]
pub(crate) struct PersonaCatalog {
    personas: BTreeMap<String, Persona>,
}

impl PersonaCatalog {
    pub(crate) fn from_personas(personas: impl IntoIterator<Item = Persona>) -> Self {
        Self {
            personas: personas
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }

    /// Built-ins overlaid with all durable rows; durable entries win.
    pub(crate) fn load(db: &BotDb) -> Result<Self, String> {
        let mut personas: BTreeMap<String, Persona> = builtin_personas()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        for row in db.list_personas()? {
            let origin = if personas.contains_key(&row.key) {
                PersonaOrigin::BuiltIn
            } else {
                PersonaOrigin::Registered {
                    created_by: row.created_by,
                    created_at: row.created_at,
                }
            };
            personas.insert(
                row.key.clone(),
                Persona {
                    id: row.key,
                    title: row.title,
                    system_prompt: row.system,
                    origin,
                },
            );
        }
        Ok(Self { personas })
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.personas.len()
    }

    /// Personas in stable (key) order; menu and listing order follow this.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }
}
