//! The export document: the cross-runtime weight interchange format.
//!
//! A document has four top-level sections, in fixed order: `config`
//! (model type and normalization constants), `meta_data` (caller-supplied
//! annotations), `parameters` (architecture hyperparameters), and
//! `state_dict` (the parameter tree with `{shape, values}` leaves). Key
//! order is insertion order everywhere, so serializing the same model twice
//! yields byte-identical JSON.

use std::path::Path;

use amp_core::{join_path, ModelError, ModelResult, ParamEntry, ParamMap, TensorData};
use serde_json::{Map, Value};

/// The `config` section: what a consumer needs before anything else.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Model family tag, e.g. `"WaveNet"`.
    pub model_type: String,
    /// Normalization mean baked into the model.
    pub norm_mean: f32,
    /// Normalization standard deviation baked into the model.
    pub norm_std: f32,
}

/// A complete export document.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub config: DocumentConfig,
    pub meta_data: Map<String, Value>,
    pub parameters: Map<String, Value>,
    pub state_dict: ParamMap,
}

impl ExportDocument {
    /// Render the document as an ordered JSON value.
    pub fn to_value(&self) -> Value {
        let mut config = Map::new();
        config.insert("model_type".into(), Value::from(self.config.model_type.clone()));
        config.insert("norm_mean".into(), Value::from(self.config.norm_mean as f64));
        config.insert("norm_std".into(), Value::from(self.config.norm_std as f64));

        let mut root = Map::new();
        root.insert("config".into(), Value::Object(config));
        root.insert("meta_data".into(), Value::Object(self.meta_data.clone()));
        root.insert("parameters".into(), Value::Object(self.parameters.clone()));
        root.insert("state_dict".into(), param_map_to_value(&self.state_dict));
        Value::Object(root)
    }

    /// Parse a document from a JSON value, normalizing legacy key aliases.
    pub fn from_value(value: &Value) -> ModelResult<Self> {
        let root = value
            .as_object()
            .ok_or_else(|| ModelError::document("top level is not an object"))?;

        let config = root
            .get("config")
            .and_then(Value::as_object)
            .ok_or_else(|| ModelError::document("missing config section"))?;
        let model_type = config
            .get("model_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::document("config.model_type must be a string"))?
            .to_string();
        let norm_mean = config
            .get("norm_mean")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModelError::document("config.norm_mean must be a number"))?
            as f32;
        let norm_std = config
            .get("norm_std")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModelError::document("config.norm_std must be a number"))?
            as f32;

        let meta_data = root
            .get("meta_data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let parameters = root
            .get("parameters")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| ModelError::document("missing parameters section"))?;
        let state_dict = root
            .get("state_dict")
            .ok_or_else(|| ModelError::document("missing state_dict section"))?;

        Ok(Self {
            config: DocumentConfig {
                model_type,
                norm_mean,
                norm_std,
            },
            meta_data,
            parameters,
            state_dict: param_map_from_value(state_dict, "")?,
        })
    }

    /// Serialize to a JSON string (deterministic key order).
    pub fn to_json_string(&self) -> ModelResult<String> {
        serde_json::to_string(&self.to_value())
            .map_err(|e| ModelError::document(format!("serialization failed: {e}")))
    }

    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ModelError::document(format!("failed to parse JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Read a document from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write the document to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// Map legacy field names from older exports onto the canonical schema.
fn canonical_key(key: &str) -> &str {
    match key {
        "inputConv" => "input_conv",
        "outputConv" => "output_conv",
        other => other,
    }
}

fn param_map_to_value(map: &ParamMap) -> Value {
    let mut obj = Map::new();
    for (name, entry) in map.entries() {
        let value = match entry {
            ParamEntry::Tensor(data) => {
                let mut leaf = Map::new();
                leaf.insert(
                    "shape".into(),
                    Value::Array(data.shape.iter().map(|&d| Value::from(d)).collect()),
                );
                leaf.insert(
                    "values".into(),
                    Value::Array(
                        data.values
                            .iter()
                            .map(|&v| Value::from(v as f64))
                            .collect(),
                    ),
                );
                Value::Object(leaf)
            }
            ParamEntry::Node(node) => param_map_to_value(node),
        };
        obj.insert(name.to_string(), value);
    }
    Value::Object(obj)
}

fn param_map_from_value(value: &Value, path: &str) -> ModelResult<ParamMap> {
    let obj = value.as_object().ok_or_else(|| {
        ModelError::document(format!("state_dict entry {path:?} is not an object"))
    })?;

    let mut map = ParamMap::new();
    for (key, entry) in obj {
        let name = canonical_key(key);
        let child_path = join_path(path, name);
        match entry {
            Value::Object(child) if child.contains_key("shape") && child.contains_key("values") => {
                let data = tensor_from_value(child, &child_path)?;
                map.insert_tensor(name, data);
            }
            Value::Object(_) => {
                map.insert_node(name, param_map_from_value(entry, &child_path)?);
            }
            // Older exports embedded scalar hyperparameters (hidden_size,
            // num_hidden_layers) inside state dicts; the canonical schema
            // carries those in `parameters`, so they are skipped here.
            Value::Number(_) | Value::Bool(_) => {}
            _ => {
                return Err(ModelError::malformed_parameter(
                    child_path,
                    "expected a {shape, values} leaf or a nested object",
                ));
            }
        }
    }
    Ok(map)
}

fn tensor_from_value(leaf: &Map<String, Value>, path: &str) -> ModelResult<TensorData> {
    let shape = leaf
        .get("shape")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::malformed_parameter(path, "shape is not an array"))?
        .iter()
        .map(|v| {
            v.as_u64().map(|d| d as usize).ok_or_else(|| {
                ModelError::malformed_parameter(path, "shape entries must be non-negative integers")
            })
        })
        .collect::<ModelResult<Vec<usize>>>()?;

    let values = leaf
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::malformed_parameter(path, "values is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ModelError::malformed_parameter(path, "values entries must be numbers")
            })
        })
        .collect::<ModelResult<Vec<f32>>>()?;

    let data = TensorData::new(shape, values);
    data.validate(path)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> ExportDocument {
        let mut conv = ParamMap::new();
        conv.insert_tensor("weight", TensorData::new(vec![1, 1, 2], vec![0.5, -0.5]));
        conv.insert_tensor("bias", TensorData::new(vec![1], vec![0.25]));

        let mut state_dict = ParamMap::new();
        state_dict.insert_node("input_conv", conv);

        let mut parameters = Map::new();
        parameters.insert("kernel_size".into(), Value::from(2));

        ExportDocument {
            config: DocumentConfig {
                model_type: "WaveNet".into(),
                norm_mean: 0.0,
                norm_std: 1.0,
            },
            meta_data: Map::new(),
            parameters,
            state_dict,
        }
    }

    #[test]
    fn test_value_round_trip() {
        let doc = sample_document();
        let back = ExportDocument::from_value(&doc.to_value()).unwrap();
        assert_eq!(back.config.model_type, "WaveNet");
        assert_eq!(back.state_dict, doc.state_dict);
    }

    #[test]
    fn test_section_order_is_fixed() {
        let json = sample_document().to_json_string().unwrap();
        let config_pos = json.find("\"config\"").unwrap();
        let meta_pos = json.find("\"meta_data\"").unwrap();
        let params_pos = json.find("\"parameters\"").unwrap();
        let state_pos = json.find("\"state_dict\"").unwrap();
        assert!(config_pos < meta_pos && meta_pos < params_pos && params_pos < state_pos);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let doc = sample_document();
        assert_eq!(
            doc.to_json_string().unwrap(),
            doc.to_json_string().unwrap()
        );
    }

    #[test]
    fn test_legacy_aliases_are_normalized() {
        let json = r#"{
            "config": {"model_type": "WaveNet", "norm_mean": 0.0, "norm_std": 1.0},
            "meta_data": {},
            "parameters": {},
            "state_dict": {
                "block_stack.0": {
                    "inputConv": {"weight": {"shape": [1], "values": [1.0]}},
                    "outputConv": {"weight": {"shape": [1], "values": [2.0]}}
                }
            }
        }"#;
        let doc = ExportDocument::from_json_str(json).unwrap();
        let block = doc.state_dict.node("block_stack.0").unwrap();
        assert!(block.node("input_conv").is_some());
        assert!(block.node("output_conv").is_some());
        assert!(block.node("inputConv").is_none());
    }

    #[test]
    fn test_legacy_scalar_entries_are_skipped() {
        let json = r#"{
            "config": {"model_type": "TCN", "norm_mean": 0.0, "norm_std": 1.0},
            "meta_data": {},
            "parameters": {},
            "state_dict": {
                "plain_sequential": {
                    "hidden_size": 16,
                    "num_hidden_layers": 2,
                    "direct_linear": {"weight": {"shape": [1, 1], "values": [1.0]}}
                }
            }
        }"#;
        let doc = ExportDocument::from_json_str(json).unwrap();
        let head = doc.state_dict.node("plain_sequential").unwrap();
        assert_eq!(head.len(), 1);
        assert!(head.node("direct_linear").is_some());
    }

    #[test]
    fn test_malformed_leaf_names_path() {
        let json = r#"{
            "config": {"model_type": "WaveNet", "norm_mean": 0.0, "norm_std": 1.0},
            "meta_data": {},
            "parameters": {},
            "state_dict": {
                "input_conv": {"weight": {"shape": [3], "values": [1.0]}}
            }
        }"#;
        let err = ExportDocument::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("input_conv.weight"));
    }

    #[test]
    fn test_missing_sections_rejected() {
        let err = ExportDocument::from_json_str(r#"{"config": {}}"#).unwrap_err();
        assert!(matches!(err, ModelError::Document(_)));
    }
}
