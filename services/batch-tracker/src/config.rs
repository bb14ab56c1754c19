use crate::errors::TrackerError;
use config::{ConfigError, Environment, File};
use pharma_ledger::WorkflowConfig;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub iot: IotConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string; empty selects the in-process store
    #[serde(default)]
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IotConfig {
    pub base_url: String,
    /// ThingSpeak channel ID
    #[serde(default)]
    pub channel: String,
    pub results: u32,
    pub timeout_secs: u64,
    pub overheat_threshold_c: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.workers", 4)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("iot.base_url", "https://api.thingspeak.com")?
            .set_default("iot.channel", "")?
            .set_default("iot.results", 10)?
            .set_default("iot.timeout_secs", 10)?
            .set_default("iot.overheat_threshold_c", 30.0)?
            .set_default("workflow.duplicate_policy", "restock")?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("BATCH_TRACKER").separator("__"));

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(channel) = env::var("THINGSPEAK_CHANNEL") {
            builder = builder.set_override("iot.channel", channel)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.server.port == 0 {
            return Err(TrackerError::Config("Server port cannot be 0".to_string()));
        }

        if self.server.workers == 0 {
            return Err(TrackerError::Config("At least one worker is required".to_string()));
        }

        if !self.database.is_in_memory() && self.database.max_connections == 0 {
            return Err(TrackerError::Config(
                "Database max_connections must be positive".to_string(),
            ));
        }

        if self.iot.base_url.is_empty() {
            return Err(TrackerError::Config("IoT feed base URL is required".to_string()));
        }

        if self.iot.results == 0 {
            return Err(TrackerError::Config("IoT feed result count must be positive".to_string()));
        }

        if !self.iot.overheat_threshold_c.is_finite() {
            return Err(TrackerError::Config(
                "Overheat threshold must be a finite number".to_string(),
            ));
        }

        Ok(())
    }
}
