//! End-to-end protocol scenarios against the software die
//!
//! Every scenario runs the full RESET → … → DONE sequence and, where it
//! completes, checks the capture against the reference model.

use snn_driver::bus::{BusLayout, Mode, ModeCodes, OutputLayout, WordOrder};
use snn_driver::{
    run_scenario, run_software, spike_train, BitVector, BusSpec, ClockedDevice, DeviceConfig,
    DeviceKind, NeuronParams, Phase, ProtocolDriver, ProtocolFrame, ProtocolTiming,
    ScenarioConfig, Sequence, SnnError, SoftwareDevice, WeightPattern,
};

fn single_neuron() -> ScenarioConfig {
    ScenarioConfig {
        name: "single-input".to_string(),
        weight_pattern: WeightPattern::Fixed { bits: 0xFF },
        input_pattern: 0b0000_0001,
        ..ScenarioConfig::default()
    }
}

/// RESET(10) → SETUP_WEIGHTS → IDLE → SETUP_INPUT → IDLE → EXECUTE(32) → DONE
#[test]
fn test_reference_scenario_captures_32_samples() {
    let report = run_software(&single_neuron()).expect("scenario should validate");

    assert_eq!(report.capture.len(), 32);
    assert_eq!(report.capture.cycles(), 10 + 1 + 1 + 1 + 1 + 1 + 32);
    let spikes = report.capture.spikes(0);
    let fired: Vec<usize> = (0..32).filter(|&i| spikes[i]).collect();
    assert_eq!(fired, vec![4, 9, 14, 19, 24, 29]);
    assert_eq!(report.spike_counts(), vec![6]);
}

#[test]
fn test_gfmpw_bus_words() {
    let report = run_software(&single_neuron()).expect("scenario should validate");
    let bus = &report.capture.bus;

    assert!(bus[..10].iter().all(|&w| w == 0), "reset must be all-zero");
    assert_eq!(bus[10], 0x20, "release sets n_reset only");
    assert_eq!(bus[11], 0x20 | (0b00100 << 6) | (0xFF << 11), "weights");
    assert_eq!(bus[12], 0x20 | (0b01000 << 6), "idle");
    assert_eq!(bus[13], 0x20 | (0x01 << 11), "input");
    assert_eq!(bus[14], 0x20 | (0b01000 << 6), "idle");
    assert!(bus[15..].iter().all(|&w| w == 0x20 | (0b00001 << 6)), "execute");
}

#[test]
fn test_tinytapeout_loads_big_endian() {
    let config = ScenarioConfig {
        bus: BusSpec::Preset("tinytapeout".to_string()),
        output: OutputLayout::SINGLE_NEURON_PWM,
        fan_in: 16,
        weight_pattern: WeightPattern::Fixed { bits: 0x00FF },
        input_pattern: 0x0101,
        execute_cycles: 12,
        ..ScenarioConfig::default()
    };
    let report = run_software(&config).expect("scenario should validate");
    let layout = BusLayout::TINYTAPEOUT;

    let frames: Vec<ProtocolFrame> = report
        .capture
        .bus
        .iter()
        .map(|&w| ProtocolFrame::decode(&layout, w))
        .collect();
    let input: Vec<u32> = frames
        .iter()
        .filter(|f| f.selected_mode(&layout) == Some(Mode::SetupInput))
        .skip(1) // release frame also decodes as mode 0
        .map(|f| f.data)
        .collect();
    assert_eq!(input, vec![0x01, 0x01]);

    let weights: Vec<u32> = frames
        .iter()
        .filter(|f| f.selected_mode(&layout) == Some(Mode::SetupWeights))
        .map(|f| f.data)
        .collect();
    assert_eq!(weights, vec![0x00, 0xFF], "high byte first");

    // psp = +1 (bit 0) −1 (bit 8) = 0: never fires
    assert_eq!(report.spike_counts(), vec![0]);
    assert_eq!(report.capture.pwm(), Some(vec![false; 12]));
}

fn wide_bus(word_order: WordOrder) -> BusLayout {
    BusLayout {
        n_reset_bit: 0,
        mode_offset: 1,
        mode_width: 2,
        data_offset: 3,
        data_width: 16,
        modes: ModeCodes { input: 1, weights: 2, idle: 0, execute: 3 },
        word_order,
    }
}

/// A 16-bit data field loads one word per neuron row in either order
#[test]
fn test_sixteen_bit_bus_both_orders() {
    for (order, expected_weights) in [
        (WordOrder::LittleEndian, vec![0xFFFF, 0x00FF]),
        (WordOrder::BigEndian, vec![0x00FF, 0xFFFF]),
    ] {
        let layout = wide_bus(order);
        let config = ScenarioConfig {
            name: format!("wide-{order:?}"),
            bus: BusSpec::Custom(layout),
            neuron_count: 2,
            fan_in: 16,
            weight_pattern: WeightPattern::Rows { rows: vec![0xFFFF, 0x00FF] },
            input_pattern: 0x0301,
            ..ScenarioConfig::default()
        };
        let report = run_software(&config).expect("16-bit die should match the model");

        let frames: Vec<ProtocolFrame> = report
            .capture
            .bus
            .iter()
            .map(|&w| ProtocolFrame::decode(&layout, w))
            .collect();
        let loaded = |mode: Mode| -> Vec<u32> {
            frames
                .iter()
                .filter(|f| f.selected_mode(&layout) == Some(mode))
                .map(|f| f.data)
                .collect()
        };
        assert_eq!(loaded(Mode::SetupWeights), expected_weights, "{order:?}");
        assert_eq!(loaded(Mode::SetupInput), vec![0x0301], "{order:?}");
        assert_eq!(loaded(Mode::Execute).len(), 32);

        // neuron 0 sees +3 per step, neuron 1 sees +1 −2
        assert_eq!(report.spike_counts(), vec![19, 0]);
        let x = BitVector::from_u64(0x0301, 16).expect("fits");
        let w = BitVector::from_u64(0xFFFF, 16).expect("fits");
        let model: Vec<bool> = spike_train(&x, &w, NeuronParams::default(), 32)
            .expect("same width")
            .iter()
            .map(|o| o.spike)
            .collect();
        assert_eq!(report.capture.spikes(0), model);
    }
}

#[test]
fn test_generated_weights_cross_validate() {
    let config = ScenarioConfig {
        name: "generated".to_string(),
        neuron_count: 8,
        fan_in: 16,
        weight_pattern: WeightPattern::Generated { density: 0.5, seed: Some(42) },
        input_pattern: 0xBEEF,
        shift: 2,
        threshold: 3,
        ..ScenarioConfig::default()
    };
    let report = run_software(&config).expect("device should match the reference model");
    assert_eq!(report.weights.len(), 8);
    assert_eq!(report.capture.len(), 32);
}

#[test]
fn test_unseeded_generation_still_validates() {
    let config = ScenarioConfig {
        neuron_count: 4,
        fan_in: 8,
        weight_pattern: WeightPattern::Generated { density: 0.7, seed: None },
        input_pattern: 0xF0,
        ..ScenarioConfig::default()
    };
    run_software(&config).expect("weights are resolved once per run");
}

#[test]
fn test_ready_timeout() {
    let config = ScenarioConfig {
        ready_timeout_cycles: 4,
        device: DeviceConfig { ready_latency: 4, output_dropout: None },
        ..single_neuron()
    };
    let err = run_software(&config).expect_err("device never becomes ready in time");
    match err {
        SnnError::ProtocolTimeout { phase, cycle, budget } => {
            assert_eq!(phase, Phase::Reset);
            assert_eq!(budget, 4);
            assert_eq!(cycle, 10 + 3);
        }
        other => panic!("expected ProtocolTimeout, got {other}"),
    }

    // one edge less latency fits the budget
    let config = ScenarioConfig {
        device: DeviceConfig { ready_latency: 3, output_dropout: None },
        ..config
    };
    run_software(&config).expect("ready on the last allowed edge");
}

#[test]
fn test_short_capture() {
    let config = ScenarioConfig {
        device: DeviceConfig { ready_latency: 0, output_dropout: Some(20) },
        ..single_neuron()
    };
    let err = run_software(&config).expect_err("partial capture must not be returned");
    assert!(matches!(
        err,
        SnnError::ShortCapture { phase: Phase::Execute, expected: 32, actual: 20, .. }
    ));
}

#[test]
fn test_one_field_per_edge_and_settle() {
    let report = run_software(&single_neuron()).expect("scenario should validate");
    let layout = BusLayout::GFMPW;
    let bus = &report.capture.bus;

    for pair in bus.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if !layout.n_reset(a) && layout.n_reset(b) {
            assert_eq!(layout.mode_code(a), layout.mode_code(b));
        }
    }

    let modes: Vec<Option<Mode>> = bus
        .iter()
        .map(|&w| ProtocolFrame::decode(&layout, w).selected_mode(&layout))
        .collect();
    let first_execute = modes
        .iter()
        .position(|&m| m == Some(Mode::Execute))
        .expect("execute phase present");
    assert_eq!(modes[first_execute - 1], Some(Mode::Idle));
}

#[test]
fn test_rerun_after_failure_starts_clean() {
    let mut dev = SoftwareDevice::new(BusLayout::GFMPW, 1, 8, NeuronParams::default())
        .expect("valid device")
        .with_output_dropout(3);

    let seq = Sequence::standard(vec![0xFF], vec![0x01], 1, 8);
    let driver = ProtocolDriver::new(BusLayout::GFMPW, ProtocolTiming::default(), seq)
        .expect("valid sequence");
    assert!(driver.run(&mut dev).is_err());

    // a fresh driver resets the device; the dropout counter restarts with it
    let short = Sequence::standard(vec![0xFF], vec![0x01], 1, 3);
    let driver = ProtocolDriver::new(BusLayout::GFMPW, ProtocolTiming::default(), short)
        .expect("valid sequence");
    let capture = driver.run(&mut dev).expect("clean rerun");
    assert_eq!(capture.len(), 3);
}

/// Device that flips neuron 0's flag on one execute edge, standing in for a
/// faulty simulator.
#[derive(Debug)]
struct FlipOne {
    inner: SoftwareDevice,
    layout: BusLayout,
    driven: u64,
    executes: usize,
    flip_at: usize,
}

impl ClockedDevice for FlipOne {
    fn drive(&mut self, word: u64) {
        self.driven = word;
        self.inner.drive(word);
    }

    fn clock_edge(&mut self) {
        let frame = ProtocolFrame::decode(&self.layout, self.driven);
        if self.inner.is_ready() && frame.selected_mode(&self.layout) == Some(Mode::Execute) {
            self.executes += 1;
        }
        self.inner.clock_edge();
    }

    fn output(&self) -> Option<u64> {
        let flip = self.executes == self.flip_at + 1;
        self.inner.output().map(|w| if flip { w ^ 1 } else { w })
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn device_kind(&self) -> DeviceKind {
        DeviceKind::External
    }
}

#[test]
fn test_external_mismatch_reported() {
    let config = single_neuron();
    let mut dev = FlipOne {
        inner: config.software_device().expect("valid device"),
        layout: BusLayout::GFMPW,
        driven: 0,
        executes: 0,
        flip_at: 2,
    };
    let err = run_scenario(&config, &mut dev).expect_err("flipped spike must be caught");
    assert!(matches!(
        err,
        SnnError::OutputMismatch { cycle: 2, neuron: 0, expected: false, actual: true }
    ));
}

#[test]
fn test_step_api_reports_phases() {
    let mut dev = SoftwareDevice::new(BusLayout::GFMPW, 1, 8, NeuronParams::default())
        .expect("valid device");
    let seq = Sequence::standard(vec![0xFF], vec![0x01], 1, 2);
    let mut driver =
        ProtocolDriver::new(BusLayout::GFMPW, ProtocolTiming::default(), seq).expect("valid");

    let mut phases = Vec::new();
    while !driver.is_done() {
        let phase = driver.phase();
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
        driver.step(&mut dev).expect("step");
    }
    assert_eq!(
        phases,
        vec![
            Phase::Reset,
            Phase::SetupWeights,
            Phase::Idle,
            Phase::SetupInput,
            Phase::Idle,
            Phase::Execute
        ]
    );
    assert_eq!(driver.phase(), Phase::Done);

    let x = BitVector::from_u64(1, 8).expect("fits");
    assert_eq!(dev.input_vector(), x);
}
