mod command;

use ::sourcemap::SourceMap;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{error::Result, options::TransformOptions};

pub use command::*;

/// A source-to-source code transformer invoked once per file.
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Transforms `code`. `Ok(None)` means the file is intentionally left unchanged.
    async fn transform(&self, code: &str, options: &TransformOptions) -> Result<Option<TransformResult>>;

    /// Loads a partial configuration without transforming anything. Fails when the options are
    /// not understood.
    fn load_partial_config(&self, options: &Map<String, Value>) -> Result<()>;

    /// Describes what the stage needs from this transformer, for error messages.
    fn requirement(&self) -> String {
        format!("{} with support for the `caller` option", self.name())
    }
}

#[derive(Debug)]
pub struct TransformResult {
    pub code: String,
    pub map: Option<SourceMap>,
    pub metadata: Option<Value>,
}

impl TransformResult {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
            metadata: None,
        }
    }

    pub fn with_map(mut self, map: SourceMap) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An error reported by the transformer itself, as opposed to a failure to reach it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransformError {
    pub message: String,
    /// Formatted excerpt of the offending source.
    pub code_frame: Option<String>,
}

/// Options used to check whether a transformer understands the `caller` option.
pub fn probe_options() -> Map<String, Value> {
    let mut options = Map::new();
    options.insert(String::from("caller"), Value::Null);
    options.insert(String::from("babelrc"), Value::Bool(false));
    options.insert(String::from("configFile"), Value::Bool(false));

    options
}
