//! Protocol driver and golden reference model for the LIF accelerator.
//!
//! The chip is configured and run over a narrow bit-serial bus: one word per
//! clock edge, a small control field selecting what the data field means.
//! This crate builds those words, drives them against a device one edge at a
//! time, captures the outputs, and checks them bit for bit against a
//! reference model of the neuron arithmetic.
//!
//! # Layers
//!
//! ```text
//! ScenarioConfig (TOML)
//!   → weight / input BitVectors → bus words (to_words)
//!   → ProtocolDriver ── next_frame / observe ──▶ ClockedDevice
//!                                                  ├─ SoftwareDevice (in-process die)
//!                                                  └─ simulator / FPGA bridges
//!   → Capture ── validate_capture ◀── expected_trace (reference model)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use snn_driver::{run_software, ScenarioConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScenarioConfig::from_file("scenarios/single_input.toml")?;
//! let report = run_software(&config)?;
//! println!("{} samples, spikes per neuron {:?}",
//!          report.capture.len(), report.spike_counts());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
pub mod bits;
mod device;
mod error;
pub mod frame;
pub mod protocol;
pub mod reference;
pub mod scenario;
pub mod validate;

pub use backends::SoftwareDevice;
pub use bits::{BitVector, InputVector, WeightVector};
pub use device::{ClockedDevice, DeviceKind};
pub use error::{Result, SnnError};
pub use frame::{OutputSample, ProtocolFrame};
pub use protocol::{Capture, Phase, ProtocolDriver, ProtocolTiming, Sequence};
pub use reference::{neuron_step, psp, pwm_estimate, spike_train, NeuronOutput, NeuronParams};
pub use scenario::{BusSpec, DeviceConfig, ScenarioConfig, WeightPattern};
pub use validate::{
    expected_trace, run_scenario, run_software, validate_capture, ExpectedTrace, ScenarioReport,
};

/// Bus layouts (re-exported from snn-chip).
pub mod bus {
    pub use snn_chip::bus::{BusLayout, Mode, ModeCodes, OutputLayout, WordOrder};
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        neuron_step, run_scenario, BitVector, Capture, ClockedDevice, NeuronParams, Phase,
        ProtocolDriver, ProtocolTiming, Result, ScenarioConfig, Sequence, SnnError,
        SoftwareDevice,
    };
}
