//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml`, overlaid by `LEDGER__`-prefixed environment
//! variables (`LEDGER__SERVER__PORT=8080`).

use std::collections::HashMap;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use engine::LockStrategy;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level applied to every crate of the workspace.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub lock_strategy: LockStrategy,
    /// Upper bound on the wait for a transfer lock. Unbounded when absent.
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    /// Token issued to each user id.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    #[serde(default)]
    pub ledger: Ledger,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_sources(
            Config::builder()
                .add_source(File::with_name("settings").required(false))
                .add_source(Environment::with_prefix("LEDGER").separator("__")),
        )
    }

    fn from_sources(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
