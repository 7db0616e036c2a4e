use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use tassel_core::recurrence::GenerationConfig;

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: String,
    #[serde(default)]
    pub generation: GenerationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "tassel.db".to_string(),
            generation: GenerationSettings::default(),
        }
    }
}

/// Generation tuning as exposed through the config file; mapped onto the
/// core's `GenerationConfig`.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GenerationSettings {
    /// Materialization window in days ahead of today.
    pub lookahead_days: i64,
    /// Limit for a single generation batch.
    pub max_batch_size: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            lookahead_days: 30,
            max_batch_size: 100,
        }
    }
}

impl From<GenerationSettings> for GenerationConfig {
    fn from(settings: GenerationSettings) -> Self {
        Self {
            lookahead_days: settings.lookahead_days,
            max_batch_size: settings.max_batch_size,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("tassel.toml"))
            .merge(Env::prefixed("TASSEL_"))
            .extract()
    }
}
