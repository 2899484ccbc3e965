//! The unit of data flowing through a pipeline.

pub mod sourcemap;

use ::sourcemap::SourceMap;
use std::{
    borrow::Cow,
    fmt,
    path::{Component, Path, PathBuf},
    pin::Pin,
};
use tokio::io::AsyncRead;

/// The contents of a file object. Exactly one state holds at a time.
#[derive(Debug)]
pub enum Contents {
    /// The file has no contents (a directory, or a file read without its contents).
    Null,
    /// The contents are still being produced by a reader.
    Stream(ContentStream),
    /// The contents are fully buffered.
    Buffer(Vec<u8>),
}

/// Streaming contents handed to the pipeline by an upstream stage.
pub struct ContentStream(Pin<Box<dyn AsyncRead + Send>>);

impl ContentStream {
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self(Box::pin(reader))
    }

    pub fn into_inner(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.0
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentStream(..)")
    }
}

#[derive(Debug)]
pub struct FileObject {
    /// The directory `path` is relative to.
    base: PathBuf,
    /// Absolute path of the file.
    pub path: PathBuf,
    pub contents: Contents,
    /// Source map describing how `contents` maps back to the original sources.
    pub source_map: Option<SourceMap>,
    /// Side-channel metadata produced by the transformer.
    pub metadata: Option<serde_json::Value>,
}

impl FileObject {
    /// Creates a file object rooted at `base`. A relative `path` is resolved against `base`.
    pub fn new(base: impl Into<PathBuf>, path: impl AsRef<Path>, contents: Contents) -> Self {
        let base = base.into();
        let path = base.join(path);

        Self {
            base,
            path,
            contents,
            source_map: None,
            metadata: None,
        }
    }

    pub fn buffer(base: impl Into<PathBuf>, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        Self::new(base, path, Contents::Buffer(contents.into()))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The path relative to the base directory, always `/` separated.
    pub fn relative(&self) -> String {
        let relative = self.path.strip_prefix(&self.base).unwrap_or(&self.path);

        to_unix_path(relative)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream(_))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.contents, Contents::Buffer(_))
    }

    /// The buffered contents decoded as UTF-8. Null and streaming contents have no text.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }
}

/// Rewrites the extension of `path` to `.js`. Paths without an extension, such as executable
/// scripts, are left untouched.
pub fn replace_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.with_extension("js")
    } else {
        path.to_path_buf()
    }
}

pub(crate) fn to_unix_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some(Cow::Borrowed("..")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
