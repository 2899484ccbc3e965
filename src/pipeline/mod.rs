//! Drives files from disk through the transform stage and back to disk.

pub mod dest;
pub mod source;

use futures::StreamExt;
use std::{io::Write, path::PathBuf};

use self::{dest::Destination, source::source};
use crate::{
    config::{Config, CONFIG_FILE},
    error::{Result, StageError},
    file::{
        sourcemap::{self, SourceMapMode},
        FileObject,
    },
    stage::{ErrorReporter, TransformStage},
};

// - Read every source file under the configured base, minus ignored files
// - Load or start a source map for each file, unless maps are disabled
//    - A file whose inline map cannot be loaded fails on its own
// - Run each file through the stage, in order
//    - Forwarded files get their source map written and land in the destination
//    - Failed files go to the error reporter, which decides whether the run goes on

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub failed: usize,
}

pub struct Pipeline {
    root: PathBuf,
    config: Config,
    stage: TransformStage,
}

impl Pipeline {
    /// Loads `stage.toml` from `root` and builds the stage it describes.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load(root.join(CONFIG_FILE))?;
        let stage = TransformStage::from_config(&config, &root)?;

        Ok(Self::new(root, config, stage))
    }

    pub fn new(root: impl Into<PathBuf>, config: Config, stage: TransformStage) -> Self {
        Self {
            root: root.into(),
            config,
            stage,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Keep processing the remaining files after one fails.
    pub fn keep_going(&mut self) {
        self.config.stage.keep_going = true;
    }

    /// Runs the pipeline, reporting failures on stderr.
    pub async fn run(&self) -> Result<Summary> {
        let reporter = ErrorReporter::stderr();
        let mut reporter = if self.config.stage.keep_going {
            reporter.continuing()
        } else {
            reporter
        };

        self.run_with(&mut reporter).await
    }

    pub async fn run_with<W: Write>(&self, reporter: &mut ErrorReporter<W>) -> Result<Summary> {
        let config = &self.config.stage;
        let base = self.root.join(&config.base);
        let destination = Destination::new(self.root.join(&config.destination));

        let files = source(&base, &config.source, &config.ignore)?;
        tracing::debug!(count = files.len(), base = %base.display(), "running pipeline");

        let track_maps = config.source_maps != SourceMapMode::None;
        let prepared = files.into_iter().map(|mut file| -> Result<FileObject, StageError> {
            if track_maps {
                sourcemap::init(&mut file).map_err(|err| StageError::transform_failure(&file.path, err))?;
            }

            Ok(file)
        });

        let results = futures::stream::iter(prepared).then(move |prepared| async move {
            match prepared {
                Ok(file) => self.stage.handle(file).await,
                Err(error) => Err(error),
            }
        });
        futures::pin_mut!(results);

        let mut summary = Summary::default();
        while let Some(result) = results.next().await {
            match result {
                Ok(mut file) => {
                    let map_file = sourcemap::write(&mut file, config.source_maps)?;

                    destination.write(&file).await?;
                    if let Some(map_file) = map_file {
                        destination.write(&map_file).await?;
                    }

                    summary.written += 1;
                }
                Err(error) => {
                    summary.failed += 1;

                    if reporter.report(&error).is_break() {
                        break;
                    }
                }
            }
        }

        Ok(summary)
    }
}
