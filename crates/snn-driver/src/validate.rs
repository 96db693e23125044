//! Cross-validation of captured outputs against the reference model
//!
//! The reference model runs off-device on the same weight and input vectors
//! the driver loads; every captured spike flag must match it bit for bit.

use crate::bits::{InputVector, WeightVector};
use crate::device::ClockedDevice;
use crate::error::{Result, SnnError};
use crate::protocol::{Capture, Phase, ProtocolDriver};
use crate::reference::{integrate, psp, NeuronParams};
use crate::scenario::ScenarioConfig;
use tracing::{info, warn};

/// Reference spikes and potentials, indexed `[cycle][neuron]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTrace {
    spikes: Vec<Vec<bool>>,
    potentials: Vec<Vec<i32>>,
}

impl ExpectedTrace {
    /// Execute cycles covered.
    pub fn cycles(&self) -> usize {
        self.spikes.len()
    }

    /// Neurons per cycle.
    pub fn neuron_count(&self) -> usize {
        self.spikes.first().map_or(0, Vec::len)
    }

    /// Spike flag of `neuron` at `cycle`.
    pub fn spike(&self, cycle: usize, neuron: usize) -> Option<bool> {
        self.spikes.get(cycle)?.get(neuron).copied()
    }

    /// Membrane potential of `neuron` after `cycle`.
    pub fn potential(&self, cycle: usize, neuron: usize) -> Option<i32> {
        self.potentials.get(cycle)?.get(neuron).copied()
    }

    /// Spike count per neuron over the whole trace.
    pub fn spike_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.neuron_count()];
        for row in &self.spikes {
            for (c, &s) in counts.iter_mut().zip(row) {
                *c += usize::from(s);
            }
        }
        counts
    }
}

/// Run the reference model for every neuron over `cycles` execute steps,
/// each starting from the reset potential.
///
/// # Errors
///
/// Returns `InvalidWidth` if a weight vector is not as wide as `x`.
pub fn expected_trace(
    x: &InputVector,
    weights: &[WeightVector],
    params: NeuronParams,
    cycles: usize,
) -> Result<ExpectedTrace> {
    let drive = weights
        .iter()
        .map(|w| psp(x, w))
        .collect::<Result<Vec<_>>>()?;

    let mut u = vec![snn_chip::topology::reset_state::MEMBRANE; weights.len()];
    let mut spikes = Vec::with_capacity(cycles);
    let mut potentials = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        let mut row = Vec::with_capacity(weights.len());
        for (ui, &p) in u.iter_mut().zip(&drive) {
            let out = integrate(p, *ui, params);
            *ui = out.u;
            row.push(out.spike);
        }
        spikes.push(row);
        potentials.push(u.clone());
    }
    Ok(ExpectedTrace { spikes, potentials })
}

/// Compare a capture with the reference trace, cycle by cycle.
///
/// # Errors
///
/// Returns `ShortCapture` if the sample count differs from the trace length,
/// and `OutputMismatch` at the first spike flag that disagrees.
pub fn validate_capture(capture: &Capture, trace: &ExpectedTrace) -> Result<()> {
    if capture.len() != trace.cycles() {
        return Err(SnnError::ShortCapture {
            phase: Phase::Done,
            cycle: capture.cycles() as u64,
            expected: trace.cycles(),
            actual: capture.len(),
        });
    }
    for (sample, expected) in capture.samples.iter().zip(&trace.spikes) {
        for (neuron, &want) in expected.iter().enumerate() {
            let got = sample.spike(&capture.output_layout, neuron);
            if got != want {
                warn!(
                    "Mismatch at execute cycle {} neuron {neuron}: expected {want}, got {got}",
                    sample.cycle
                );
                return Err(SnnError::OutputMismatch {
                    cycle: sample.cycle,
                    neuron,
                    expected: want,
                    actual: got,
                });
            }
        }
    }
    Ok(())
}

/// Outcome of a validated scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// What the device produced.
    pub capture: Capture,
    /// What the reference model predicted.
    pub trace: ExpectedTrace,
    /// Weight vectors that were loaded.
    pub weights: Vec<WeightVector>,
}

impl ScenarioReport {
    /// Spike count per neuron.
    pub fn spike_counts(&self) -> Vec<usize> {
        self.trace.spike_counts()
    }
}

/// Drive `device` through the whole scenario and validate the capture.
///
/// Weights are resolved once, so an unseeded generated pattern loads and
/// predicts from the same mask.
///
/// # Errors
///
/// Returns the first configuration, protocol, or validation error.
pub fn run_scenario<D: ClockedDevice + ?Sized>(
    config: &ScenarioConfig,
    device: &mut D,
) -> Result<ScenarioReport> {
    let weights = config.weight_rows()?;
    let x = config.input()?;
    let params = config.params()?;

    let driver = ProtocolDriver::new(config.layout()?, config.timing(), config.sequence(&weights)?)?
        .with_output_layout(config.output);
    let capture = driver.run(device)?;

    let trace = expected_trace(&x, &weights, params, config.execute_cycles)?;
    validate_capture(&capture, &trace)?;
    info!(
        "Scenario {:?} matched the reference model over {} cycles, spikes per neuron {:?}",
        config.name,
        trace.cycles(),
        trace.spike_counts()
    );

    Ok(ScenarioReport {
        name: config.name.clone(),
        capture,
        trace,
        weights,
    })
}

/// [`run_scenario`] against a [`SoftwareDevice`](crate::SoftwareDevice)
/// built from the scenario itself.
///
/// # Errors
///
/// Same as [`run_scenario`].
pub fn run_software(config: &ScenarioConfig) -> Result<ScenarioReport> {
    let mut device = config.software_device()?;
    run_scenario(config, &mut device)
}
