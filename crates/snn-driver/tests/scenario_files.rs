//! Scenario files on disk: the shipped examples and mask-file weights

use snn_driver::{run_software, Phase, ScenarioConfig, SnnError, WeightPattern};
use snn_masks::{Layer, MaskGenerator};
use std::fs;
use std::path::PathBuf;

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(name)
}

#[test]
fn test_shipped_scenarios_validate() {
    for name in ["single_input.toml", "tinytapeout_pwm.toml", "generated_layer.toml"] {
        let config = ScenarioConfig::from_file(shipped(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let report = run_software(&config).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(report.capture.len(), config.execute_cycles, "{name}");
    }
}

#[test]
fn test_shipped_slow_reset_times_out() {
    let config = ScenarioConfig::from_file(shipped("slow_reset.toml")).expect("parses");
    assert!(matches!(
        run_software(&config),
        Err(SnnError::ProtocolTimeout { phase: Phase::Reset, budget: 4, .. })
    ));
}

#[test]
fn test_mask_file_relative_to_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layer = Layer::new("l0", 16, 4, 0.5).expect("valid layer");
    let mask = MaskGenerator::seeded(9).generate(&layer).expect("generates");
    mask.write_to(dir.path().join("connections_0.mem"))
        .expect("writes");

    let scenario = dir.path().join("from_mask.toml");
    fs::write(
        &scenario,
        r#"
name = "from-mask"
neuron_count = 4
fan_in = 16
input_pattern = 0xFFFF
threshold = 2

[weight_pattern]
kind = "mask_file"
path = "connections_0.mem"
"#,
    )
    .expect("writes scenario");

    let config = ScenarioConfig::from_file(&scenario).expect("parses");
    let report = run_software(&config).expect("validates");
    for (row, w) in mask.rows().zip(&report.weights) {
        let bits: Vec<bool> = (0..16).map(|i| w.get(i)).collect();
        assert_eq!(bits, row);
    }
}

#[test]
fn test_mask_shape_must_match_die() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layer = Layer::new("l0", 8, 2, 0.5).expect("valid layer");
    MaskGenerator::seeded(1)
        .generate(&layer)
        .expect("generates")
        .write_to(dir.path().join("small.mem"))
        .expect("writes");

    let config = ScenarioConfig {
        neuron_count: 4,
        fan_in: 16,
        weight_pattern: WeightPattern::MaskFile {
            path: dir.path().join("small.mem"),
        },
        ..ScenarioConfig::default()
    };
    assert!(matches!(config.weight_rows(), Err(SnnError::Config { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
    assert!(matches!(
        ScenarioConfig::from_file(shipped("does_not_exist.toml")),
        Err(SnnError::Io { .. })
    ));
}
