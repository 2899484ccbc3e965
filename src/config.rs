use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};
use toml::{value::Table, Value};

use crate::{
    error::{Error, Result},
    file::sourcemap::SourceMapMode,
};

/// Name of the configuration file looked up in a project root.
pub const CONFIG_FILE: &str = "stage.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Configuration for the pipeline and the stage itself.
    pub stage: StageConfig,

    /// Any remaining configuration, including the transformer options.
    rest: Value,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let mut buffer = String::new();
        File::open(path)
            .with_context(|| "Failed to open config file")?
            .read_to_string(&mut buffer)
            .with_context(|| "Failed to read config file")?;

        Config::from_str(&buffer)
    }

    /// Deserializes the top-level table named `key`, if present.
    pub fn get<'de, T: Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        self.rest
            .get(key)
            .cloned()
            .map(|value| value.try_into())
            .transpose()
            .with_context(|| format!("Failed to deserialize `{key}`"))
    }

    /// The `[options]` table, forwarded verbatim to the transformer.
    pub fn transform_options(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let Some(options) = self.rest.get("options") else {
            return Ok(serde_json::Map::new());
        };

        match serde_json::to_value(options)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => anyhow::bail!("`options` must be a table"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stage: StageConfig::default(),
            rest: Value::Table(Table::default()),
        }
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let raw = Value::deserialize(deserializer)?;
        let Value::Table(mut table) = raw else {
            return Err(D::Error::custom("stage.toml must always be a toml table"));
        };

        let stage: StageConfig = table
            .remove("stage")
            .map(|stage| stage.try_into().map_err(D::Error::custom))
            .transpose()?
            .unwrap_or_default();

        let config = Config {
            stage,
            rest: Value::Table(table),
        };

        Ok(config)
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        toml::from_str(source).with_context(|| "Attempted to parse invalid configuration file")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct StageConfig {
    /// Name the transformer is known by in logs and errors.
    pub name: String,
    /// Command starting the external transformer.
    pub command: Option<String>,
    /// Glob patterns, relative to `base`, selecting the files to transform.
    pub source: Vec<String>,
    /// Glob patterns, relative to `base`, of files to leave out.
    pub ignore: Vec<String>,
    /// Relative path to the directory sources are read from.
    pub base: PathBuf,
    /// Relative path to the directory transformed files are written to.
    pub destination: PathBuf,
    pub source_maps: SourceMapMode,
    /// Keep processing the remaining files after one fails.
    pub keep_going: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: String::from("transformer"),
            command: None,
            source: vec![String::from("**/*.js"), String::from("**/*.jsx")],
            ignore: Vec::new(),
            base: PathBuf::from("./src"),
            destination: PathBuf::from("./dist"),
            source_maps: SourceMapMode::default(),
            keep_going: false,
        }
    }
}
