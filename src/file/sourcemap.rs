//! Attaching, loading and writing source maps on file objects.

use ::sourcemap::SourceMap;
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::{Contents, FileObject};
use crate::error::Result;

const URL_PREFIX: &str = "//# sourceMappingURL=";
const DATA_URL_PREFIX: &str = "data:application/json;charset=utf8;base64,";

/// How source maps are emitted when files leave the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMapMode {
    /// Embed the map in the file as a base64 data URL comment.
    #[default]
    Inline,
    /// Write the map next to the file as `<name>.map`.
    External,
    /// Drop the map.
    None,
}

/// Applies a source map produced by a later stage onto `file`.
///
/// The map must name its output `file`. When the file already carries a map with mappings, the new
/// map is composed onto it so the result still points at the original sources. Otherwise the new
/// map simply becomes the file's map.
pub fn apply_source_map(file: &mut FileObject, mut map: SourceMap) -> Result<()> {
    let Some(target) = map.get_file().map(|target| target.replace('\\', "/")) else {
        anyhow::bail!("Source map to be applied is missing the \"file\" property");
    };

    map.set_file(Some(target.as_str()));

    match file.source_map.take() {
        Some(mut existing) if existing.get_token_count() > 0 => {
            existing.adjust_mappings(&map);
            existing.set_file(Some(target.as_str()));
            file.source_map = Some(existing);
        }
        _ => file.source_map = Some(map),
    }

    Ok(())
}

/// Prepares `file` for source map tracking.
///
/// A map embedded in the contents as a data URL is decoded, attached, and its comment line
/// removed. Code following the comment is kept. Files without one get an empty map whose only
/// source is the file itself. Files without buffered contents are left alone.
pub fn init(file: &mut FileObject) -> Result<()> {
    let relative = file.relative();
    let Contents::Buffer(ref mut bytes) = file.contents else {
        return Ok(());
    };

    if let Some((comment, map)) = find_inline_map(bytes)? {
        let end = (comment.end + 1).min(bytes.len());
        bytes.drain(comment.start..end);

        // NOTE: A trailing comment leaves the newline that preceded it behind.
        if comment.start == bytes.len() {
            while bytes.last() == Some(&b'\n') {
                bytes.pop();
            }
        }

        file.source_map = Some(map);
        return Ok(());
    }

    let source = serde_json::json!({
        "version": 3,
        "file": relative,
        "names": [],
        "sources": [relative],
        "sourcesContent": [String::from_utf8_lossy(bytes)],
        "mappings": "",
    });
    let map = SourceMap::from_slice(&serde_json::to_vec(&source)?)
        .with_context(|| format!("failed to create source map for {relative}"))?;

    file.source_map = Some(map);

    Ok(())
}

/// Emits the source map of `file` according to `mode`.
///
/// The map's `file` is set to the file's relative path. For [`SourceMapMode::External`] the map
/// file to write alongside is returned.
pub fn write(file: &mut FileObject, mode: SourceMapMode) -> Result<Option<FileObject>> {
    let external = match mode {
        SourceMapMode::None => {
            file.source_map = None;
            return Ok(None);
        }
        SourceMapMode::Inline => false,
        SourceMapMode::External => true,
    };

    let relative = file.relative();
    let base = file.base().to_path_buf();
    let (Some(map), Contents::Buffer(bytes)) = (file.source_map.as_mut(), &mut file.contents) else {
        return Ok(None);
    };

    map.set_file(Some(relative.as_str()));

    let mut json = Vec::new();
    map.to_writer(&mut json)
        .with_context(|| format!("failed to serialize source map for {relative}"))?;

    if !bytes.is_empty() && bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }

    if !external {
        let comment = format!("{URL_PREFIX}{DATA_URL_PREFIX}{}\n", STANDARD.encode(&json));
        bytes.extend_from_slice(comment.as_bytes());

        return Ok(None);
    }

    let map_path = format!("{relative}.map");
    let map_name = map_path.rsplit('/').next().unwrap_or(&map_path);
    let comment = format!("{URL_PREFIX}{map_name}\n");
    bytes.extend_from_slice(comment.as_bytes());

    Ok(Some(FileObject::buffer(base, map_path, json)))
}

/// Finds the last inline data URL map in `bytes`, returning the span of its comment without the
/// line break.
fn find_inline_map(bytes: &[u8]) -> Result<Option<(Range<usize>, SourceMap)>> {
    let Some(comment_start) = memmem::rfind(bytes, URL_PREFIX.as_bytes()) else {
        return Ok(None);
    };

    let url_start = comment_start + URL_PREFIX.len();
    let url_end = memchr::memchr(b'\n', &bytes[url_start..])
        .map(|offset| url_start + offset)
        .unwrap_or(bytes.len());
    let url = String::from_utf8_lossy(&bytes[url_start..url_end]);

    // NOTE: Only data URLs are loaded, references to other files are left in place.
    let Some((_, encoded)) = url
        .trim()
        .strip_prefix("data:application/json")
        .and_then(|rest| rest.split_once("base64,"))
    else {
        return Ok(None);
    };

    let decoded = STANDARD
        .decode(encoded)
        .with_context(|| "Inline source map is not valid base64")?;
    let map = SourceMap::from_slice(&decoded).with_context(|| "Inline source map is not valid")?;

    Ok(Some((comment_start..url_end, map)))
}
