use crate::config::*;
use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tso: TsoConfig,
    pub election: ElectionConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Layers `config/default`, `config/{env}` and `TSO__SECTION__KEY`
    /// environment variables, later sources winning.
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("TSO").separator("__"))
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.tso.validate()?;
        app.election.validate()?;
        Ok(app)
    }
}
