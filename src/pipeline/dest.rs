use anyhow::Context;
use std::path::PathBuf;

use crate::{
    error::Result,
    file::{Contents, FileObject},
};

/// Writes file objects under a destination directory, keeping their relative paths.
pub struct Destination {
    root: PathBuf,
}

impl Destination {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes `file` and returns where it landed. Files without buffered contents are skipped.
    pub async fn write(&self, file: &FileObject) -> Result<Option<PathBuf>> {
        let Contents::Buffer(ref bytes) = file.contents else {
            return Ok(None);
        };

        let target = self.root.join(file.relative());
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write file: {}", target.display()))?;

        tracing::debug!(path = %target.display(), "wrote file");

        Ok(Some(target))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_files_by_relative_path() {
        let dir = TempDir::new().expect("temp dir");
        let destination = Destination::new(dir.path().join("dist"));
        let file = FileObject::buffer("/src", "nested/app.js", "var a;");

        let written = destination
            .write(&file)
            .await
            .expect("write should succeed")
            .expect("file should be written");

        assert_eq!(dir.path().join("dist/nested/app.js"), written);
        assert_eq!("var a;", std::fs::read_to_string(written).expect("should read back"));
    }

    #[tokio::test]
    async fn skips_files_without_contents() {
        let dir = TempDir::new().expect("temp dir");
        let destination = Destination::new(dir.path());
        let file = FileObject::new("/src", "empty", Contents::Null);

        let written = destination.write(&file).await.expect("write should succeed");

        assert_eq!(None, written);
    }
}
