//! Settings of the `ledgerlens` binary.
//!
//! Sources, later ones win: an optional `settings.toml` in the working
//! directory, then `LEDGERLENS__<SECTION>__<KEY>` environment variables.
//! See `settings.example.toml` for every key.

use config::{Config, ConfigError, Environment, File};
use engine::{ExtractionSettings, LifecycleSettings, RateSettings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Mirror {
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    pub mirror: Mirror,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub rates: RateSettings,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("LEDGERLENS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}
