//! Builds the `AppConfig` from layered sources with `figment`:
//! `config/base.toml`, then `config/<environment>.toml`, then `APP_`-prefixed environment variables
//! (`__` separates sections, e.g. `APP_VERIFIER_CONFIG__API_KEY`).
//! Credentials and identifiers have no defaults anywhere in the tree, they must come from the environment.

mod error;
mod types;

use std::{path::Path, sync::OnceLock};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::info;

// Re-export config structs
pub use error::{ConfigError, ConfigResult};
pub use types::{
    parse_url, AppConfig, AuditLayout, Environment, IntakeConfig, MarketingConfig, NetConfig,
    ResponseMode, SheetsConfig, VerifierApi, VerifierConfig, WebhookConfig,
};

pub const ENV_PREFIX: &str = "APP_";

impl AppConfig {
    /// The layered `Figment` for the given environment, reading files from `config_dir`.
    pub fn figment(config_dir: &Path, environment: Environment) -> Figment {
        let environment_filename = format!("{}.toml", environment.as_ref().to_lowercase());

        Figment::new()
            .merge(Toml::file(config_dir.join("base.toml")))
            .merge(Toml::file(config_dir.join(environment_filename)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extracts and validates the configuration. Missing required values surface
    /// as `ConfigError::ConfigurationMissing`.
    pub fn from_figment(figment: Figment) -> ConfigResult<Self> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `./config` for the environment named by `APP_ENVIRONMENT`
    /// (defaults to `local`).
    pub fn load() -> ConfigResult<Self> {
        let config_dir = std::env::current_dir()?.join("config");
        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()?;

        Self::from_figment(Self::figment(&config_dir, environment))
    }
}

/// Loads the configuration once and hands out a `&'static` to it afterwards.
pub fn get_or_init_config() -> ConfigResult<&'static AppConfig> {
    static CONFIG_INIT: OnceLock<AppConfig> = OnceLock::new();
    if let Some(config) = CONFIG_INIT.get() {
        return Ok(config);
    }

    info!("{:<20} - Initializing the configuration", "get_or_init_config");
    let config = AppConfig::load()?;
    Ok(CONFIG_INIT.get_or_init(|| config))
}
