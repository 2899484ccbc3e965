use serde_json::{json, Map, Value};
use sourcemap::SourceMap;
use std::sync::{Arc, Mutex};
use transpile_stage::{
    error::Result,
    options::TransformOptions,
    stage::{probe::CapabilityProbe, TransformStage},
    transform::{TransformError, TransformResult, Transformer},
};

const KNOWN_PLUGINS: &[&str] = &["block-scoping", "arrow-functions", "metadata-hook", "skip"];

/// A transformer that understands a handful of fake plugins and records every call.
#[derive(Clone)]
pub struct FakeTransformer {
    accepts_caller: bool,
    calls: Arc<Mutex<Vec<TransformOptions>>>,
}

impl FakeTransformer {
    pub fn new() -> Self {
        Self {
            accepts_caller: true,
            calls: Arc::default(),
        }
    }

    /// A transformer too old to understand the `caller` option.
    #[allow(dead_code)] // Avoid a false positive on the dead code analysis.
    pub fn rejecting_caller() -> Self {
        Self {
            accepts_caller: false,
            ..Self::new()
        }
    }

    #[allow(dead_code)] // Avoid a false positive on the dead code analysis.
    pub fn calls(&self) -> Vec<TransformOptions> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// The map this transformer produces for a call with `options`.
    pub fn map_for(options: &TransformOptions) -> Option<SourceMap> {
        if options.get("sourceMaps") == Some(&Value::Bool(false)) {
            return None;
        }

        let source = options
            .source_file_name()
            .map(String::from)
            .or_else(|| {
                options
                    .input_source_map()
                    .and_then(|map| map["sources"][0].as_str())
                    .map(String::from)
            })
            .or_else(|| options.filename_relative().map(String::from))
            .expect("a source name is always available");

        let map = json!({
            "version": 3,
            "sources": [source],
            "names": [],
            "mappings": "AAAA;AACA",
        });

        Some(SourceMap::from_slice(&serde_json::to_vec(&map).expect("should serialize")).expect("valid map"))
    }
}

#[async_trait::async_trait]
impl Transformer for FakeTransformer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transform(&self, code: &str, options: &TransformOptions) -> Result<Option<TransformResult>> {
        self.calls.lock().expect("calls lock poisoned").push(options.clone());

        let plugins: Vec<String> = options
            .get("plugins")
            .and_then(Value::as_array)
            .map(|plugins| plugins.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        if let Some(missing) = plugins.iter().find(|plugin| !KNOWN_PLUGINS.contains(&plugin.as_str())) {
            anyhow::bail!("Cannot find module '{missing}'");
        }

        if code.contains("@@") {
            return Err(TransformError {
                message: String::from("Unexpected token (1:0)"),
                code_frame: Some(String::from("> 1 | @@\n    | ^")),
            }
            .into());
        }

        if plugins.iter().any(|plugin| plugin == "skip") {
            return Ok(None);
        }

        let mut output = code.to_string();
        if plugins.iter().any(|plugin| plugin == "block-scoping") {
            output = output.replace("let ", "var ");
        }
        if plugins.iter().any(|plugin| plugin == "arrow-functions") {
            output = output.replace("v => v + 1", "function (v) {\n  return v + 1;\n}");
        }

        let mut metadata = json!({ "usedHelpers": [], "plugins": plugins });
        if plugins.iter().any(|plugin| plugin == "metadata-hook") {
            // NOTE: Mimics a plugin mutating metadata in its post hook.
            metadata["postHook"] = json!({ "visited": options.filename_relative() });
        }

        let mut result = TransformResult::new(output).with_metadata(metadata);
        if let Some(map) = Self::map_for(options) {
            result = result.with_map(map);
        }

        Ok(Some(result))
    }

    fn load_partial_config(&self, options: &Map<String, Value>) -> Result<()> {
        if options.contains_key("caller") && !self.accepts_caller {
            anyhow::bail!("Unknown option: .caller");
        }

        Ok(())
    }
}

/// A stage over `transformer` with its own capability probe.
pub fn stage(transformer: &FakeTransformer, options: Value) -> TransformStage {
    let Value::Object(options) = options else {
        panic!("options must be an object")
    };

    TransformStage::new(Arc::new(transformer.clone()), options).with_probe(Arc::new(CapabilityProbe::new()))
}

/// The JSON form of `map`, for comparisons.
#[allow(dead_code)] // Avoid a false positive on the dead code analysis.
pub fn map_json(map: &SourceMap) -> Value {
    let mut buffer = Vec::new();
    map.to_writer(&mut buffer).expect("map should serialize");

    serde_json::from_slice(&buffer).expect("map should be json")
}
