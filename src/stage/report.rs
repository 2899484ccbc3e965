use std::{
    io::{self, Write},
    ops::ControlFlow,
};

use crate::error::StageError;

/// Pretty-prints stage errors and tells the host whether to keep consuming the stage.
pub struct ErrorReporter<W> {
    out: W,
    keep_going: bool,
}

impl ErrorReporter<io::Stderr> {
    /// Reports to stderr and ends the stage after the first error.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ErrorReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            keep_going: false,
        }
    }

    /// Keep consuming the stage after reporting an error.
    pub fn continuing(mut self) -> Self {
        self.keep_going = true;
        self
    }

    /// Writes the error message followed by the code excerpt, then signals whether the consuming
    /// stage should be considered finished.
    pub fn report(&mut self, error: &StageError) -> ControlFlow<()> {
        let written = writeln!(self.out, "{error}")
            .and_then(|_| writeln!(self.out, "{}", error.code_frame().unwrap_or_default()))
            .and_then(|_| self.out.flush());

        if let Err(err) = written {
            tracing::warn!(error = %err, "failed to report stage error");
        }

        if self.keep_going {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Reports `error` on stderr. Always signals that the stage is finished.
pub fn log_error(error: &StageError) -> ControlFlow<()> {
    ErrorReporter::stderr().report(error)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::TransformError;

    fn syntax_error() -> StageError {
        StageError::transform_failure(
            "/src/app.jsx",
            TransformError {
                message: String::from("Unexpected token (1:4)"),
                code_frame: Some(String::from("> 1 | let = 1;\n    |     ^")),
            }
            .into(),
        )
    }

    #[test]
    fn writes_message_then_code_frame() {
        let mut reporter = ErrorReporter::new(Vec::new());

        let flow = reporter.report(&syntax_error());

        assert_eq!(ControlFlow::Break(()), flow);
        assert_eq!(
            "transpile-stage: /src/app.jsx: Unexpected token (1:4)\n> 1 | let = 1;\n    |     ^\n",
            String::from_utf8(reporter.into_inner()).expect("should be utf8")
        );
    }

    #[test]
    fn missing_code_frame_leaves_an_empty_line() {
        let mut reporter = ErrorReporter::new(Vec::new());

        assert!(reporter.report(&StageError::UnsupportedMode).is_break());

        assert_eq!(
            "transpile-stage: streaming content is not supported\n\n",
            String::from_utf8(reporter.into_inner()).expect("should be utf8")
        );
    }

    #[test]
    fn continuing_reporter_keeps_the_stage_alive() {
        let mut reporter = ErrorReporter::new(io::sink()).continuing();

        assert_eq!(ControlFlow::Continue(()), reporter.report(&syntax_error()));
    }
}
