use std::env;
use std::io;
use std::path::PathBuf;

pub(crate) const DEFAULT_DB_PATH: &str = "./data.db";
pub(crate) const DEFAULT_PORT: u16 = 8000;

pub(crate) fn env_required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    let value = env::var(name).unwrap_or_default();
    if value.trim().is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("Missing {name}")).into());
    }
    Ok(value)
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn env_u64(name: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    match env_optional(name) {
        Some(value) => Ok(value
            .parse::<u64>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid {name}")))?),
        None => Ok(default),
    }
}

pub(crate) fn env_u16(name: &str, default: u16) -> Result<u16, Box<dyn std::error::Error>> {
    match env_optional(name) {
        Some(value) => Ok(value
            .parse::<u16>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid {name}")))?),
        None => Ok(default),
    }
}

/// Comma-separated admin chat ids; malformed entries are skipped.
pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|item| item.trim().parse::<i64>().ok())
        .collect()
}

/// Environment surface consumed by the bot. Resolved once at startup;
/// missing credentials degrade individual calls instead of failing here.
#[derive(Debug, Clone)]
pub(crate) struct BotConfig {
    pub(crate) db_path: PathBuf,
    pub(crate) base_url: Option<String>,
    #[allow(dead_code)] // read but unused by dispatch in this version
    pub(crate) admin_ids: Vec<i64>,
}

impl BotConfig {
    pub(crate) fn from_env() -> Self {
        let db_path = resolve_db_path(None);
        let base_url = env_optional("BASE_URL");
        let admin_ids = env_optional("ADMIN_IDS")
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default();
        Self {
            db_path,
            base_url,
            admin_ids,
        }
    }
}

pub(crate) fn resolve_db_path(cli_db: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_db {
        return path;
    }
    if let Some(value) = env_optional("DATABASE_PATH") {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_DB_PATH)
}
