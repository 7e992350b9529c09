use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use home::home_dir;
use serde::Deserialize;

pub struct GopinConfig {
    pub workspace_root: Option<PathBuf>,
    pub go_command: Option<String>,
}

impl GopinConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_file = home_dir().map(|home| home.join(".config/gopin/config.toml"));
        let raw_config = RawConfig::load(config_file, None)?;

        Ok(Self {
            workspace_root: raw_config.workspace.root,
            go_command: raw_config.go.command,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    workspace: WorkspaceConfig,
    #[serde(default)]
    go: GoConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct WorkspaceConfig {
    root: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GoConfig {
    command: Option<String>,
}

impl RawConfig {
    fn load(
        config_file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(config_file) = config_file {
            builder = builder.add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder
            .add_source(
                Environment::with_prefix("GOPIN")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
