//! Export/import round-trip tests across every model family.

use amp_core::{ParamEntry, ParamMap};
use candle_core::{Device, Tensor};
use serde_json::{json, Map, Value};
use weight_export::{build, export, init_model, ExportDocument};

fn lcg_sequence(seed: u64, n: usize) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32) / (u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

fn to_vec(t: &Tensor) -> Vec<f32> {
    t.flatten_all().unwrap().to_vec1::<f32>().unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test parameter sets are objects"),
    }
}

fn all_architectures() -> Vec<(&'static str, Map<String, Value>)> {
    vec![
        (
            "WaveNet",
            object(json!({
                "input_size": 1, "output_size": 1, "num_channels": 4,
                "kernel_size": 3, "dilations": [1, 2, 4], "stack_size": 2,
                "gated": true, "hidden_size": 8
            })),
        ),
        (
            "TCN",
            object(json!({
                "input_size": 1, "hidden_size": 4, "output_size": 1,
                "kernel_size": 3, "stack_size": 3,
                "ps_hidden_size": 8, "ps_num_hidden_layers": 1
            })),
        ),
        (
            "MicroTCN",
            object(json!({
                "input_size": 1, "hidden_size": 4, "output_size": 1,
                "kernel_size": 3, "stack_size": 2,
                "ps_hidden_size": 8, "ps_num_hidden_layers": 0
            })),
        ),
        (
            "ConvWaveshaper",
            object(json!({
                "kernel_size": 16, "depth_size": 3, "num_channels": 4
            })),
        ),
        (
            "HammersteinWiener",
            object(json!({
                "input_size": 1, "linear_input_size": 4, "linear_output_size": 6,
                "hidden_size": 8, "output_size": 1
            })),
        ),
        (
            "ResLSTM",
            object(json!({
                "input_size": 1, "output_size": 1, "hidden_size": 4,
                "ps_hidden_size": 6, "ps_num_hidden_layers": 1
            })),
        ),
        (
            "ResGRU",
            object(json!({
                "input_size": 1, "output_size": 1, "hidden_size": 4,
                "ps_hidden_size": 6, "ps_num_hidden_layers": 1
            })),
        ),
    ]
}

#[test]
fn export_import_round_trip_preserves_outputs() {
    let device = Device::Cpu;
    let norm = effect_model::NormConfig {
        norm_mean: 0.01,
        norm_std: 0.8,
    };
    let x = Tensor::from_vec(lcg_sequence(1234, 1024), (1, 1, 1024), &device).unwrap();

    for (model_type, parameters) in all_architectures() {
        let model = init_model(model_type, &parameters, norm, &device).unwrap();
        let expected = to_vec(&model.process(&x).unwrap());

        // Full trip through the serialized form, not just the in-memory doc.
        let json = export(model.as_effect_model())
            .unwrap()
            .to_json_string()
            .unwrap();
        let document = ExportDocument::from_json_str(&json).unwrap();
        let rebuilt = build(&document, &device).unwrap();

        assert_eq!(rebuilt.model_type(), model_type);
        let actual = to_vec(&rebuilt.process(&x).unwrap());
        assert_eq!(expected.len(), actual.len(), "{model_type}");
        for (i, (a, b)) in expected.iter().zip(actual.iter()).enumerate() {
            assert!(
                (a - b).abs() <= 1e-6,
                "{model_type}: sample {i} diverged ({a} vs {b})"
            );
        }
    }
}

#[test]
fn repeated_exports_are_byte_identical() {
    let device = Device::Cpu;
    for (model_type, parameters) in all_architectures() {
        let model = init_model(
            model_type,
            &parameters,
            effect_model::NormConfig::default(),
            &device,
        )
        .unwrap();
        let first = export(model.as_effect_model())
            .unwrap()
            .to_json_string()
            .unwrap();
        let second = export(model.as_effect_model())
            .unwrap()
            .to_json_string()
            .unwrap();
        assert_eq!(first, second, "{model_type}");
    }
}

#[test]
fn every_leaf_satisfies_the_shape_invariant() {
    fn walk(map: &ParamMap, prefix: &str) {
        for (name, entry) in map.entries() {
            let path = amp_core::join_path(prefix, name);
            match entry {
                ParamEntry::Tensor(data) => {
                    assert!(!data.shape.is_empty(), "{path}: empty shape");
                    assert_eq!(
                        data.values.len(),
                        data.shape.iter().product::<usize>(),
                        "{path}: values/shape mismatch"
                    );
                }
                ParamEntry::Node(node) => walk(node, &path),
            }
        }
    }

    let device = Device::Cpu;
    for (model_type, parameters) in all_architectures() {
        let model = init_model(
            model_type,
            &parameters,
            effect_model::NormConfig::default(),
            &device,
        )
        .unwrap();
        let document = export(model.as_effect_model()).unwrap();
        walk(&document.state_dict, "");
    }
}

#[test]
fn missing_leaf_fails_with_full_path() {
    let device = Device::Cpu;
    let architectures = all_architectures();
    let (model_type, parameters) = &architectures[0];
    let model = init_model(
        model_type,
        parameters,
        effect_model::NormConfig::default(),
        &device,
    )
    .unwrap();
    let mut value = export(model.as_effect_model()).unwrap().to_value();

    // Drop one deeply nested leaf from the serialized document.
    let removed = value
        .pointer_mut("/state_dict/block_stack.1/input_conv")
        .and_then(Value::as_object_mut)
        .unwrap()
        .remove("bias");
    assert!(removed.is_some());

    let document = ExportDocument::from_value(&value).unwrap();
    let err = build(&document, &device).unwrap_err();
    assert_eq!(
        err.to_string(),
        "missing parameter leaf: block_stack.1.input_conv.bias"
    );
}

#[test]
fn mis_shaped_leaf_reports_expected_and_actual() {
    let device = Device::Cpu;
    let architectures = all_architectures();
    let (model_type, parameters) = &architectures[4]; // HammersteinWiener
    let model = init_model(
        model_type,
        parameters,
        effect_model::NormConfig::default(),
        &device,
    )
    .unwrap();
    let mut value = export(model.as_effect_model()).unwrap().to_value();

    *value
        .pointer_mut("/state_dict/lstm/bias_ih_l0")
        .unwrap() = json!({"shape": [3], "values": [0.0, 0.0, 0.0]});

    let document = ExportDocument::from_value(&value).unwrap();
    let err = build(&document, &device).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("lstm.bias_ih_l0"), "{message}");
    assert!(message.contains("[24]"), "{message}");
    assert!(message.contains("[3]"), "{message}");
}

#[test]
fn legacy_camel_case_documents_still_build() {
    let device = Device::Cpu;
    let architectures = all_architectures();
    let (model_type, parameters) = &architectures[0];
    let model = init_model(
        model_type,
        parameters,
        effect_model::NormConfig::default(),
        &device,
    )
    .unwrap();
    let mut value = export(model.as_effect_model()).unwrap().to_value();

    // Rewrite one block to the legacy camelCase key spelling.
    let block = value
        .pointer_mut("/state_dict/block_stack.0")
        .and_then(Value::as_object_mut)
        .unwrap();
    let input_conv = block.remove("input_conv").unwrap();
    let output_conv = block.remove("output_conv").unwrap();
    block.insert("inputConv".into(), input_conv);
    block.insert("outputConv".into(), output_conv);

    let document = ExportDocument::from_value(&value).unwrap();
    assert!(build(&document, &device).is_ok());
}
