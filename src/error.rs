use std::path::{Path, PathBuf};

pub use anyhow::{Error, Result};

/// The name every stage error is tagged with.
pub const PLUGIN_NAME: &str = "transpile-stage";

/// Failures raised by the transform stage for a single file.
///
/// None of these are fatal to the host. The stage keeps accepting files after any of them.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The file carried streaming contents, which the stage cannot transform.
    #[error("{}: streaming content is not supported", PLUGIN_NAME)]
    UnsupportedMode,

    /// The installed transformer failed the capability probe.
    #[error("{}: {} is required", PLUGIN_NAME, .requirement)]
    MissingDependency { requirement: String },

    /// The transformer raised while transforming `file_name`.
    #[error("{}: {}: {}", PLUGIN_NAME, .file_name.display(), .source)]
    TransformFailure {
        file_name: PathBuf,
        /// When set, reporters may dump the properties of the underlying error.
        show_properties: bool,
        /// Formatted source excerpt provided by the transformer, if any.
        code_frame: Option<String>,
        #[source]
        source: Error,
    },

    /// The stage could not be built from configuration.
    #[error("{}: {}", PLUGIN_NAME, .0)]
    Construction(String),
}

impl StageError {
    pub(crate) fn transform_failure(file_name: impl Into<PathBuf>, source: Error) -> Self {
        let code_frame = source
            .downcast_ref::<crate::transform::TransformError>()
            .and_then(|error| error.code_frame.clone());

        StageError::TransformFailure {
            file_name: file_name.into(),
            show_properties: false,
            code_frame,
            source,
        }
    }

    /// The formatted source excerpt attached to a transform failure.
    pub fn code_frame(&self) -> Option<&str> {
        match self {
            StageError::TransformFailure { code_frame, .. } => code_frame.as_deref(),
            _ => None,
        }
    }

    /// The path of the file that failed, when the failure is tied to one.
    pub fn file_name(&self) -> Option<&Path> {
        match self {
            StageError::TransformFailure { file_name, .. } => Some(file_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::TransformError;

    #[test]
    fn transform_failure_keeps_code_frame_from_transformer() {
        let source = Error::new(TransformError {
            message: String::from("Unexpected token (1:4)"),
            code_frame: Some(String::from("> 1 | let = 1;")),
        });

        let error = StageError::transform_failure("/src/app.jsx", source);

        assert_eq!(Some("> 1 | let = 1;"), error.code_frame());
        assert_eq!(Some(Path::new("/src/app.jsx")), error.file_name());
        assert_eq!(
            "transpile-stage: /src/app.jsx: Unexpected token (1:4)",
            error.to_string()
        );

        let StageError::TransformFailure { show_properties, .. } = error else {
            panic!("expected a transform failure")
        };
        assert!(!show_properties);
    }

    #[test]
    fn plain_errors_have_no_code_frame() {
        let error = StageError::transform_failure("a.js", anyhow::anyhow!("boom"));

        assert_eq!(None, error.code_frame());
    }
}
