//! Per-file options handed to the transformer.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::Result, file::FileObject};

/// Identifies this stage to the transformer through the `caller` option.
pub const CALLER_NAME: &str = "transpile-stage";

/// How a stage-computed option combines with the same key supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// The computed value replaces whatever the caller supplied.
    Stage,
    /// The computed object is a default; fields of the caller's object are merged on top.
    Merged,
}

/// Every option the stage computes, in the order they are applied.
pub const FIELD_PRECEDENCE: &[(&str, Precedence)] = &[
    ("filename", Precedence::Stage),
    ("filenameRelative", Precedence::Stage),
    ("caller", Precedence::Merged),
    ("inputSourceMap", Precedence::Stage),
    ("sourceFileName", Precedence::Stage),
];

/// The option bag for a single transformer invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformOptions(Map<String, Value>);

impl TransformOptions {
    /// Builds the options for `file` on top of the caller-supplied `base` options.
    ///
    /// A file that already carries a source map hands it over as `inputSourceMap`, since the map
    /// already records where the code came from. Otherwise `sourceFileName` names the file.
    pub fn for_file(base: &Map<String, Value>, file: &FileObject) -> Result<Self> {
        let relative = file.relative();
        let mut computed = vec![
            ("filename", Value::from(file.path.to_string_lossy().into_owned())),
            ("filenameRelative", Value::from(relative.clone())),
            ("caller", serde_json::json!({ "name": CALLER_NAME })),
        ];

        match file.source_map {
            Some(ref map) => {
                let mut json = Vec::new();
                map.to_writer(&mut json)
                    .with_context(|| format!("failed to serialize input source map of {relative}"))?;
                computed.push(("inputSourceMap", serde_json::from_slice(&json)?));
            }
            None => computed.push(("sourceFileName", Value::from(relative))),
        }

        Ok(merge(base, computed))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn filename(&self) -> Option<&str> {
        self.get("filename").and_then(Value::as_str)
    }

    pub fn filename_relative(&self) -> Option<&str> {
        self.get("filenameRelative").and_then(Value::as_str)
    }

    pub fn source_file_name(&self) -> Option<&str> {
        self.get("sourceFileName").and_then(Value::as_str)
    }

    pub fn input_source_map(&self) -> Option<&Value> {
        self.get("inputSourceMap")
    }

    pub fn caller(&self) -> Option<&Map<String, Value>> {
        self.get("caller").and_then(Value::as_object)
    }
}

/// Merges stage-computed fields over the caller's options following [`FIELD_PRECEDENCE`].
pub fn merge(base: &Map<String, Value>, computed: Vec<(&str, Value)>) -> TransformOptions {
    let mut merged = base.clone();

    for (key, value) in computed {
        let precedence = FIELD_PRECEDENCE
            .iter()
            .find(|(field, _)| *field == key)
            .map(|(_, precedence)| *precedence)
            .unwrap_or(Precedence::Stage);

        let value = match (precedence, value, base.get(key)) {
            (Precedence::Merged, Value::Object(mut defaults), Some(Value::Object(overrides))) => {
                defaults.extend(overrides.clone());
                Value::Object(defaults)
            }
            (_, value, _) => value,
        };

        merged.insert(key.to_string(), value);
    }

    TransformOptions(merged)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn base(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("base options must be an object")
        };

        map
    }

    #[test]
    fn computed_fields_override_caller_options() {
        let base = base(json!({
            "plugins": ["transform-arrow-functions"],
            "filename": "ignored.js",
            "sourceFileName": "ignored.js",
        }));
        let file = FileObject::buffer("/project/src", "nested/app.jsx", "let a;");

        let options = TransformOptions::for_file(&base, &file).expect("options should build");

        assert_eq!(Some("/project/src/nested/app.jsx"), options.filename());
        assert_eq!(Some("nested/app.jsx"), options.filename_relative());
        assert_eq!(Some("nested/app.jsx"), options.source_file_name());
        assert_eq!(None, options.input_source_map());
        assert_eq!(Some(&json!(["transform-arrow-functions"])), options.get("plugins"));
    }

    #[test]
    fn caller_overrides_are_merged_onto_the_name_tag() {
        let base = base(json!({
            "caller": { "supportsStaticESM": true },
        }));
        let file = FileObject::buffer("/src", "app.jsx", "let a;");

        let options = TransformOptions::for_file(&base, &file).expect("options should build");

        assert_eq!(
            Some(&json!({ "name": CALLER_NAME, "supportsStaticESM": true })),
            options.get("caller")
        );
    }

    #[test]
    fn caller_may_rename_itself() {
        let base = base(json!({ "caller": { "name": "custom" } }));
        let options = merge(&base, vec![("caller", json!({ "name": CALLER_NAME }))]);

        assert_eq!(Some("custom"), options.caller().and_then(|c| c["name"].as_str()));
    }

    #[test]
    fn input_map_replaces_source_file_name() {
        let mut file = FileObject::buffer("/src", "app.jsx", "let a;");
        crate::file::sourcemap::init(&mut file).expect("init should succeed");

        let options = TransformOptions::for_file(&Map::new(), &file).expect("options should build");

        assert_eq!(None, options.source_file_name());
        let input = options.input_source_map().expect("input map should be set");
        assert_eq!(json!(["app.jsx"]), input["sources"]);
    }
}
