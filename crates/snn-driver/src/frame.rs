//! Per-cycle bus frames and captured output samples

use snn_chip::bus::{BusLayout, Mode, OutputLayout};

/// One bus sample: control field plus data payload.
///
/// Built fresh each cycle, encoded onto the bus, then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolFrame {
    /// Not-in-reset flag.
    pub n_reset: bool,
    /// Raw mode field.
    pub mode_code: u32,
    /// Data payload (weight word, input word, or don't-care).
    pub data: u32,
}

/// Payload driven when the data field is don't-care.
pub const DONT_CARE: u32 = 0;

impl ProtocolFrame {
    /// Reset asserted; encodes to the all-zero word.
    pub const fn reset() -> Self {
        Self {
            n_reset: false,
            mode_code: 0,
            data: 0,
        }
    }

    /// Reset released with the mode field still at its reset value, so the
    /// release edge changes only `n_reset`.
    pub const fn release() -> Self {
        Self {
            n_reset: true,
            mode_code: 0,
            data: 0,
        }
    }

    /// Out of reset, selecting `mode` on `layout`.
    pub const fn mode(layout: &BusLayout, mode: Mode, data: u32) -> Self {
        Self {
            n_reset: true,
            mode_code: layout.modes.code(mode),
            data,
        }
    }

    /// Pack onto the bus.
    pub const fn encode(&self, layout: &BusLayout) -> u64 {
        layout.pack(self.n_reset, self.mode_code, self.data)
    }

    /// Unpack a raw bus word.
    pub const fn decode(layout: &BusLayout, word: u64) -> Self {
        Self {
            n_reset: layout.n_reset(word),
            mode_code: layout.mode_code(word),
            data: layout.data(word),
        }
    }

    /// Mode selected by this frame, if out of reset and the code is known.
    pub fn selected_mode(&self, layout: &BusLayout) -> Option<Mode> {
        if self.n_reset {
            layout.modes.mode(self.mode_code)
        } else {
            None
        }
    }
}

/// One captured output word, indexed by execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSample {
    /// Execute cycle index within the capture.
    pub cycle: usize,
    /// Raw output bus word.
    pub word: u64,
}

impl OutputSample {
    /// Spike flag of neuron `index`.
    pub const fn spike(&self, layout: &OutputLayout, index: usize) -> bool {
        layout.spike(self.word, index)
    }

    /// PWM pin, if the layout has one.
    pub const fn pwm(&self, layout: &OutputLayout) -> Option<bool> {
        layout.pwm(self.word)
    }
}
