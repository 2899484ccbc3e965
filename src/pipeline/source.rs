use anyhow::Context;
use glob::Pattern;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::Result,
    file::{to_unix_path, FileObject},
};

/// Reads every file under `base` matching one of `patterns` and none of `ignore`.
///
/// Files come back sorted by relative path so repeated runs see the same order. A file matched
/// by several patterns is read once.
pub fn source(base: &Path, patterns: &[String], ignore: &[String]) -> Result<Vec<FileObject>> {
    let ignore = ignore
        .iter()
        .map(|pattern| Pattern::new(pattern).with_context(|| format!("Invalid ignore pattern `{pattern}`")))
        .collect::<Result<Vec<_>>>()?;

    let mut matched = BTreeMap::<String, PathBuf>::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let entries = glob::glob(&full_pattern.to_string_lossy())
            .with_context(|| format!("Invalid source pattern `{pattern}`"))?;

        for entry in entries {
            let path = entry?;
            if !path.is_file() {
                continue;
            }

            let relative = to_unix_path(path.strip_prefix(base).unwrap_or(&path));
            if ignore.iter().any(|pattern| pattern.matches(&relative)) {
                tracing::debug!(path = %relative, "ignoring file");
                continue;
            }

            matched.insert(relative, path);
        }
    }

    matched
        .into_values()
        .map(|path| -> Result<FileObject> {
            let contents = fs::read(&path).with_context(|| format!("failed to read file: {}", path.display()))?;

            Ok(FileObject::buffer(base, path, contents))
        })
        .collect()
}
