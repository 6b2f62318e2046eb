//! Layered settings: built-in defaults, an optional file, then environment
//! variables prefixed with `LOGICAL_DELETION` (nested keys split on `__`,
//! e.g. `LOGICAL_DELETION_DELETION__ACTOR=batch`).

use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub deletion: DeletionSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file. In-memory when absent.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeletionSettings {
    /// Label handed to the audit sink as the acting party.
    pub actor: String,
    /// Table used by `TableAudit`.
    pub audit_table: String,
}
impl Default for DeletionSettings {
    fn default() -> Self {
        Self {
            actor: "system".to_string(),
            audit_table: "delete_audits".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
}
impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("LOGICAL_DELETION")
                .prefix_separator("_")
                .separator("__"),
        );
        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
    pub fn open_connection(&self) -> Result<Connection> {
        let connection = match &self.database.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Ok(connection)
    }
}

/// Installs a `fmt` subscriber for the configured filter. Later calls are
/// ignored, so tests may call it freely.
pub fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_new(&log.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
