//! Process configuration: a TOML file (default `bancho.toml`) layered under
//! environment variable overrides, via the `config` crate.

use config::{Config, Environment, File};
use serde::Deserialize;

use bancho_core::config::BanchoConfig;

fn default_bind_addr() -> String {
    "0.0.0.0:13381".to_string()
}

fn default_bot_name() -> String {
    "BanchoBot".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandaloneConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default)]
    pub bancho: BanchoConfig,
}

impl StandaloneConfig {
    /// Loads `path` (if present) layered under `BANCHO_`-prefixed environment
    /// variables, e.g. `BANCHO__BANCHO__WELCOME_MESSAGE`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("BANCHO").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}
