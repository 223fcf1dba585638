//! Layered configuration: defaults, then an optional config file, then
//! environment variables — the same `config`+`dotenvy` shape as the
//! teacher's `services/token-engine/src/config.rs::Config::from_env`.

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level service configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
}

/// `serve` command defaults; CLI flags override these at startup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Initial superuser name, created if `superuser_password` is also set.
    pub superuser: Option<String>,
}

/// Postgres connection settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// `LIBEUFIN_NEXUS_DB_CONNECTION`, or `config/<env>.toml`'s `database.url`.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Config {
    /// Load configuration: defaults, then `config/<NEXUS_ENV>.toml` if
    /// present, then environment variables (`NEXUS__SERVER__PORT`, etc.),
    /// then the spec-mandated `LIBEUFIN_NEXUS_DB_CONNECTION` override.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let environment = env::var("NEXUS_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(File::with_name(&format!("config/{environment}")).required(false));
        }

        builder = builder.add_source(Environment::with_prefix("NEXUS").separator("__"));

        if let Ok(db_url) = env::var("LIBEUFIN_NEXUS_DB_CONNECTION") {
            builder = builder.set_override("database.url", db_url)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Fail fast on an unusable configuration rather than at the first
    /// query.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server port cannot be 0".to_string());
        }
        if self.database.url.is_empty() {
            return Err(
                "database url is required (LIBEUFIN_NEXUS_DB_CONNECTION or database.url)".to_string(),
            );
        }
        Ok(())
    }
}
