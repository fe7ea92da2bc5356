use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::store::ConfigStore;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory holding the `Dockerfile-{type}` build recipes.
    pub templates_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    /// Shell used to run the replica-set initiation script.
    pub mongo_shell: String,
    /// Write each successful launch under `last_launch` in the state file.
    pub record_launches: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            state_file: None,
            mongo_shell: "mongo".into(),
            record_launches: false,
        }
    }
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file("mongo-runner.toml"))
                .merge(Json::file("mongo-runner.json"))
                .merge(Env::prefixed("MONGO_RUNNER_")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if settings.mongo_shell.trim().is_empty() {
            anyhow::bail!("Invalid mongo_shell: must not be empty");
        }

        Ok(settings)
    }

    /// Store for persisted state, `state_file` if set, else `~/.mongo-runner`.
    pub fn config_store(&self) -> Result<ConfigStore> {
        match &self.state_file {
            Some(path) => Ok(ConfigStore::new(path)),
            None => ConfigStore::in_home(),
        }
    }
}
