use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "personabot")]
#[command(about = "Webhook chat bot with selectable LLM personas", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create the bot database and seed the built-in personas.
    Init {
        /// Database path (falls back to DATABASE_PATH, then ./data.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run the webhook server.
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Listen port (falls back to PORT, then 8000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Database path (falls back to DATABASE_PATH, then ./data.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Register the public webhook URL with the chat platform.
    RegisterWebhook {
        /// Externally reachable base URL (falls back to BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// List all personas known to the catalog.
    Personas {
        /// Database path (falls back to DATABASE_PATH, then ./data.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a persona if the id is not already taken (never overwrites).
    PersonaAdd {
        /// Persona id (stable, unique)
        id: String,
        /// Display title
        #[arg(long)]
        title: String,
        /// System prompt establishing the persona's voice
        #[arg(long)]
        system: String,
        /// Registering user id
        #[arg(long)]
        created_by: Option<i64>,
        /// Database path (falls back to DATABASE_PATH, then ./data.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}
