mod catalog;
mod cli;
mod config;
mod dispatch;
mod events;
mod gateway;
mod server;
mod store;
mod telegram;

use clap::Parser;
use serde::Serialize;
use url::Url;

use crate::catalog::{PersonaCatalog, PersonaOrigin, builtin_personas};
use crate::cli::{Cli, Command};
use crate::config::{BotConfig, DEFAULT_PORT, env_required, env_u16, resolve_db_path};
use crate::gateway::AnthropicGateway;
use crate::server::run_server;
use crate::store::BotDb;
use crate::telegram::TelegramSink;

#[derive(Serialize)]
struct PersonaSummary<'a> {
    id: &'a str,
    title: &'a str,
    builtin: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { db } => {
            let db_path = resolve_db_path(db);
            let db = BotDb::open_or_create(&db_path)?;
            let seeded = db.seed_builtins(&builtin_personas())?;
            println!("Initialized {} ({seeded} personas seeded)", db_path.display());
            Ok(())
        }

        Command::Serve { bind, port, db } => {
            let mut config = BotConfig::from_env();
            config.db_path = resolve_db_path(db);
            let port = match port {
                Some(port) => port,
                None => env_u16("PORT", DEFAULT_PORT)?,
            };

            let db = BotDb::open_or_create(&config.db_path)?;
            db.seed_builtins(&builtin_personas())?;
            let catalog = PersonaCatalog::load(&db)?;
            drop(db);
            eprintln!(
                "[serve] catalog loaded: {} personas from {}",
                catalog.len(),
                config.db_path.display()
            );

            let gateway = AnthropicGateway::from_env();
            let sink = TelegramSink::from_env();
            run_server(&bind, port, config, catalog, gateway, sink)
        }

        Command::RegisterWebhook { base_url } => {
            let base = match base_url {
                Some(value) => value,
                None => env_required("BASE_URL")?,
            };
            let base = Url::parse(&base).map_err(|e| format!("invalid base url: {e}"))?;
            let sink = TelegramSink::from_env();
            let response = sink.register_webhook(&base)?;
            println!("{response}");
            Ok(())
        }

        Command::Personas { db, json } => {
            let db_path = resolve_db_path(db);
            let db = BotDb::open_or_create(&db_path)?;
            let catalog = PersonaCatalog::load(&db)?;

            if json {
                let summaries: Vec<PersonaSummary> = catalog
                    .iter()
                    .map(|p| PersonaSummary {
                        id: &p.id,
                        title: &p.title,
                        builtin: p.origin == PersonaOrigin::BuiltIn,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if catalog.is_empty() {
                println!("No personas.");
            } else {
                for persona in catalog.iter() {
                    println!("{} — {}", persona.id, persona.title);
                }
            }
            Ok(())
        }

        Command::PersonaAdd {
            id,
            title,
            system,
            created_by,
            db,
        } => {
            let db_path = resolve_db_path(db);
            let db = BotDb::open_or_create(&db_path)?;
            let inserted = db.register_persona(&id, &title, &system, created_by)?;
            if !inserted {
                eprintln!("Refusing to overwrite existing persona: {id}");
                std::process::exit(2);
            }
            println!("Registered {id} — {title}");
            Ok(())
        }
    }
}
