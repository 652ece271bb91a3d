use std::path::PathBuf;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

/// One year. Longer lifetimes are refused rather than silently capped.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
    pub scaler_path: PathBuf,
    pub model_path: PathBuf,
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
}

impl Settings {
    /// Defaults, then `config.toml` when present, then the process environment.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().try_parsing(true))
            .build()
            .and_then(Self::from_config)
    }

    /// Deserialize and check values the type alone cannot constrain.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Self = config.try_deserialize()?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&settings.session_ttl_hours) {
            return Err(ConfigError::Message(format!(
                "session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {}",
                settings.session_ttl_hours
            )));
        }
        Ok(settings)
    }

    /// `database_url` and `secret_key` have no default and must be supplied.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("pool_size", 10)?
            .set_default("scaler_path", "ml_model/scaler.json")?
            .set_default("model_path", "ml_model/model.json")?
            .set_default("session_ttl_hours", 12)?
            .set_default("secure_cookies", false)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
