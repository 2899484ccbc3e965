use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shlex::Shlex;
use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Output, Stdio},
};
use tokio::io::AsyncWriteExt;

use super::{TransformError, TransformResult, Transformer};
use crate::{error::Result, options::TransformOptions};

/// A transformer running as a child process.
///
/// Each call spawns the command, writes a single JSON request to its stdin and reads a single JSON
/// response from its stdout.
pub struct CommandTransformer {
    name: String,
    command: String,
    root: PathBuf,
}

impl CommandTransformer {
    pub fn new(name: String, command: String, root: impl Into<PathBuf>) -> Self {
        Self {
            name,
            command,
            root: root.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum Request<'a> {
    Transform {
        code: &'a str,
        options: &'a TransformOptions,
    },
    LoadPartialConfig {
        options: &'a Map<String, Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Response {
    Failure { error: ErrorBody },
    Success(ResultBody),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    code_frame: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    code: String,
    map: Option<Value>,
    metadata: Option<Value>,
}

impl CommandTransformer {
    fn build_command(&self) -> Result<Command> {
        let mut parts = Shlex::new(&self.command);
        let Some(bin) = parts.next() else {
            anyhow::bail!("Provided command string was empty");
        };

        // NOTE: Get the path to the binary.
        let bin = PathBuf::from(bin);
        let bin = if bin.components().count() == 1 {
            // NOTE: Search for the binary in PATH.
            bin
        } else {
            // NOTE: Search for the binary relative to the project root.
            self.root.join(bin)
        };

        let mut command = Command::new(bin);
        command
            .args(parts)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        Ok(command)
    }

    fn parse_response(&self, output: Output) -> Result<Option<Response>> {
        if !output.status.success() {
            anyhow::bail!("Transformer {} failed ({}).", self.name, output.status);
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Transformer {} returned an invalid response", self.name))
    }
}

#[async_trait]
impl Transformer for CommandTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(&self, code: &str, options: &TransformOptions) -> Result<Option<TransformResult>> {
        let payload = serde_json::to_vec(&Request::Transform { code, options })?;
        let mut process = tokio::process::Command::from(self.build_command()?)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start transformer {}", self.name))?;

        let Some(mut stdin) = process.stdin.take() else {
            anyhow::bail!("Transformer {} has no stdin", self.name);
        };

        // NOTE: Feed stdin while collecting output so a chatty child cannot deadlock on a full pipe.
        let write = async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, process.wait_with_output());
        let response = self.parse_response(output?)?;
        written.with_context(|| format!("Failed to write request to transformer {}", self.name))?;

        match response {
            None => Ok(None),
            Some(Response::Failure { error }) => Err(TransformError {
                message: error.message,
                code_frame: error.code_frame,
            }
            .into()),
            Some(Response::Success(body)) => {
                let map = body
                    .map
                    .map(|map| -> Result<::sourcemap::SourceMap> {
                        Ok(::sourcemap::SourceMap::from_slice(&serde_json::to_vec(&map)?)?)
                    })
                    .transpose()
                    .with_context(|| format!("Transformer {} returned an invalid source map", self.name))?;

                Ok(Some(TransformResult {
                    code: body.code,
                    map,
                    metadata: body.metadata,
                }))
            }
        }
    }

    fn load_partial_config(&self, options: &Map<String, Value>) -> Result<()> {
        let mut process = self
            .build_command()?
            .spawn()
            .with_context(|| format!("Failed to start transformer {}", self.name))?;

        let mut stdin = process.stdin.take().context("Child process has no stdin")?;
        serde_json::to_writer(&mut stdin, &Request::LoadPartialConfig { options })?;
        stdin.flush()?;

        // NOTE: Explicitly drop stdin to close it.
        drop(stdin);

        match self.parse_response(process.wait_with_output()?)? {
            Some(Response::Failure { error }) => Err(TransformError {
                message: error.message,
                code_frame: error.code_frame,
            }
            .into()),
            _ => Ok(()),
        }
    }
}
