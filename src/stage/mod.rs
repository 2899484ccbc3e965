//! The per-file transform stage.

pub mod probe;
pub mod report;

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::{path::Path, sync::Arc};

use self::probe::CapabilityProbe;
use crate::{
    config::Config,
    error::StageError,
    file::{self, sourcemap::apply_source_map, Contents, FileObject},
    options::TransformOptions,
    transform::{CommandTransformer, TransformResult, Transformer},
};

pub use report::{log_error, ErrorReporter};

/// Runs a [`Transformer`] over every file object handed to it.
pub struct TransformStage {
    transformer: Arc<dyn Transformer>,
    /// Caller-supplied options forwarded to the transformer for every file.
    options: Map<String, Value>,
    probe: Arc<CapabilityProbe>,
}

impl TransformStage {
    pub fn new(transformer: Arc<dyn Transformer>, options: Map<String, Value>) -> Self {
        let probe = CapabilityProbe::shared(transformer.name());

        Self {
            transformer,
            options,
            probe,
        }
    }

    /// Uses `probe` instead of the process-wide probe for this transformer.
    pub fn with_probe(mut self, probe: Arc<CapabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Builds a stage running the command transformer configured in `config`.
    pub fn from_config(config: &Config, root: &Path) -> Result<Self, StageError> {
        let Some(ref command) = config.stage.command else {
            return Err(StageError::Construction(String::from(
                "no transformer command is configured",
            )));
        };

        let options = config
            .transform_options()
            .map_err(|err| StageError::Construction(format!("{err:#}")))?;
        let transformer = CommandTransformer::new(config.stage.name.clone(), command.clone(), root);

        Ok(Self::new(Arc::new(transformer), options))
    }

    /// Transforms a single file.
    ///
    /// Files without contents pass through untouched. An `Err` means the file must not be
    /// forwarded; the stage itself remains usable.
    pub async fn handle(&self, mut file: FileObject) -> Result<FileObject, StageError> {
        match file.contents {
            Contents::Null => {
                tracing::debug!(path = %file.path.display(), "passing through file without contents");
                return Ok(file);
            }
            Contents::Stream(_) => return Err(StageError::UnsupportedMode),
            Contents::Buffer(_) => {}
        }

        if !self.probe.supports_caller_option(self.transformer.as_ref()) {
            return Err(StageError::MissingDependency {
                requirement: self.transformer.requirement(),
            });
        }

        let has_input_map = file.source_map.is_some();
        let options = TransformOptions::for_file(&self.options, &file)
            .map_err(|err| StageError::transform_failure(&file.path, err))?;
        let code = file.text().unwrap_or_default().into_owned();

        tracing::debug!(
            path = %file.path.display(),
            transformer = self.transformer.name(),
            has_input_map,
            "transforming file"
        );

        match self.transformer.transform(&code, &options).await {
            Ok(Some(result)) => {
                apply_result(&mut file, result, has_input_map)
                    .map_err(|err| StageError::transform_failure(&file.path, err))?;
            }
            Ok(None) => {
                tracing::debug!(path = %file.path.display(), "transformer left file unchanged");
            }
            Err(err) => {
                tracing::warn!(path = %file.path.display(), error = %err, "transform failed");
                return Err(StageError::transform_failure(&file.path, err));
            }
        }

        Ok(file)
    }

    /// Feeds `input` through the stage one file at a time.
    ///
    /// Results come out in input order, and the returned stream ends once `input` ends, whether or
    /// not any file failed.
    pub fn pipe<'a, S>(&'a self, input: S) -> impl Stream<Item = Result<FileObject, StageError>> + 'a
    where
        S: Stream<Item = FileObject> + 'a,
    {
        input.then(move |file| self.handle(file))
    }
}

fn apply_result(file: &mut FileObject, result: TransformResult, has_input_map: bool) -> crate::error::Result<()> {
    if let Some(mut map) = result.map {
        if has_input_map {
            // NOTE: The transformer was given the input map, so its map already points at the originals.
            file.source_map = Some(map);
        } else {
            let output = file::replace_extension(Path::new(&file.relative()));
            map.set_file(Some(file::to_unix_path(&output).as_str()));
            apply_source_map(file, map)?;
        }
    }

    file.contents = Contents::Buffer(result.code.into_bytes());
    file.path = file::replace_extension(&file.path);
    file.metadata = result.metadata;

    Ok(())
}
