//! Software (virtual die) device
//!
//! Implements [`ClockedDevice`] with the same integer arithmetic the silicon
//! uses, so a full protocol scenario can run without a simulator or a board:
//!
//! 1. **CI without hardware**: every protocol test drives this device.
//! 2. **Cross-validation baseline**: its outputs must agree bit-for-bit with
//!    the reference model; an external device is checked the same way.
//!
//! ## Register model
//!
//! ```text
//! weight register: neuron_count × fan_in bits, neuron 0 in the lowest bits
//! input register:  fan_in bits
//! each SETUP edge shifts one data word in; the oldest word falls out
//!   little-endian dies: new word enters at the top, shifts toward bit 0
//!   big-endian dies:    new word enters at the bottom, shifts toward the top
//! ```

use crate::bits::BitVector;
use crate::device::{ClockedDevice, DeviceKind};
use crate::error::{Result, SnnError};
use crate::reference::{integrate, psp, NeuronParams};
use snn_chip::bus::{BusLayout, Mode, OutputLayout, WordOrder};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Software emulation of one die.
#[derive(Debug, Clone)]
pub struct SoftwareDevice {
    layout: BusLayout,
    output_layout: OutputLayout,
    neuron_count: usize,
    fan_in: usize,
    params: NeuronParams,

    weights: ShiftRegister,
    inputs: ShiftRegister,
    membrane: Vec<i32>,

    /// Word presented for the next edge
    bus_in: u64,
    in_reset: bool,
    edges_since_release: u32,
    /// Edges after release before the device reports ready
    ready_latency: u32,

    output: Option<u64>,
    executed: usize,
    /// Execute edges after which the output goes unresolved
    output_dropout: Option<usize>,
}

impl SoftwareDevice {
    /// Create a device with `neuron_count` neurons of `fan_in` synapses.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the layout is inconsistent, a dimension is
    /// zero, or the spike flags do not fit the 64-bit output word.
    pub fn new(
        layout: BusLayout,
        neuron_count: usize,
        fan_in: usize,
        params: NeuronParams,
    ) -> Result<Self> {
        layout.validate().map_err(SnnError::invalid_parameter)?;
        if neuron_count == 0 || fan_in == 0 {
            return Err(SnnError::invalid_parameter(format!(
                "device needs at least one neuron and one input (got {neuron_count}×{fan_in})"
            )));
        }
        let output_layout = OutputLayout::SPIKES_ONLY;
        check_output_fits(&output_layout, neuron_count)?;
        let w = layout.data_width;
        Ok(Self {
            layout,
            output_layout,
            neuron_count,
            fan_in,
            params,
            weights: ShiftRegister::new(neuron_count * fan_in, w, layout.word_order),
            inputs: ShiftRegister::new(fan_in, w, layout.word_order),
            membrane: vec![0; neuron_count],
            bus_in: 0,
            in_reset: true,
            edges_since_release: 0,
            ready_latency: 0,
            output: Some(0),
            executed: 0,
            output_dropout: None,
        })
    }

    /// Report spikes at `layout` instead of from bit 0. The PWM pin, if any,
    /// is left low.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the flags or the PWM pin fall past bit 63
    /// or overlap.
    pub fn with_output_layout(mut self, layout: OutputLayout) -> Result<Self> {
        check_output_fits(&layout, self.neuron_count)?;
        self.output_layout = layout;
        Ok(self)
    }

    /// Report ready only after `edges` extra edges out of reset.
    #[must_use]
    pub fn with_ready_latency(mut self, edges: u32) -> Self {
        self.ready_latency = edges;
        self
    }

    /// Stop resolving the output bus after `samples` execute edges.
    #[must_use]
    pub fn with_output_dropout(mut self, samples: usize) -> Self {
        self.output_dropout = Some(samples);
        self
    }

    /// Neurons on the die.
    pub const fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    /// Synapses per neuron.
    pub const fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Output bit assignment.
    pub const fn output_layout(&self) -> &OutputLayout {
        &self.output_layout
    }

    /// Weight vector currently held for neuron `index`.
    pub fn weight_row(&self, index: usize) -> BitVector {
        self.weights.bits().slice(index * self.fan_in, self.fan_in)
    }

    /// Input vector currently held.
    pub fn input_vector(&self) -> BitVector {
        self.inputs.bits()
    }

    /// Membrane potentials, one per neuron.
    pub fn membrane(&self) -> &[i32] {
        &self.membrane
    }

    fn reset(&mut self) {
        self.weights.clear();
        self.inputs.clear();
        self.membrane.fill(0);
        self.in_reset = true;
        self.edges_since_release = 0;
        self.executed = 0;
        self.output = Some(0);
    }

    fn execute(&mut self) {
        let x = self.inputs.bits();
        let register = self.weights.bits();
        self.executed += 1;

        let word = match self.fire(&x, &register) {
            Ok(word) => word,
            Err(e) => {
                warn!("SoftwareDevice: execute edge {} unresolved: {e}", self.executed);
                self.output = None;
                return;
            }
        };
        self.output = match self.output_dropout {
            Some(limit) if self.executed > limit => None,
            _ => Some(word),
        };
        trace!("execute edge {}: out={word:#x} u={:?}", self.executed, self.membrane);
    }

    /// Integrate every neuron once and return the spike word. Membranes are
    /// left untouched on error.
    fn fire(&mut self, x: &BitVector, register: &BitVector) -> Result<u64> {
        let drives = (0..self.neuron_count)
            .map(|i| psp(x, &register.slice(i * self.fan_in, self.fan_in)))
            .collect::<Result<Vec<i32>>>()?;

        let mut word = 0u64;
        for (i, (u, drive)) in self.membrane.iter_mut().zip(drives).enumerate() {
            let out = integrate(drive, *u, self.params);
            *u = out.u;
            if out.spike {
                word |= 1 << (usize::from(self.output_layout.spike_offset) + i);
            }
        }
        Ok(word)
    }
}

impl ClockedDevice for SoftwareDevice {
    fn drive(&mut self, word: u64) {
        self.bus_in = word;
    }

    fn clock_edge(&mut self) {
        let word = self.bus_in;
        if !self.layout.n_reset(word) {
            if !self.in_reset {
                debug!("SoftwareDevice: reset asserted");
            }
            self.reset();
            return;
        }

        let was_ready = self.is_ready();
        self.in_reset = false;
        self.edges_since_release = self.edges_since_release.saturating_add(1);
        if !was_ready {
            return;
        }

        let data = self.layout.data(word);
        match self.layout.modes.mode(self.layout.mode_code(word)) {
            Some(Mode::SetupWeights) => {
                self.weights.shift_in(data);
                self.output = Some(0);
            }
            Some(Mode::SetupInput) => {
                self.inputs.shift_in(data);
                self.output = Some(0);
            }
            Some(Mode::Idle) => self.output = Some(0),
            Some(Mode::Execute) => self.execute(),
            None => {
                warn!(
                    "SoftwareDevice: unknown mode code {:#x}, holding",
                    self.layout.mode_code(word)
                );
            }
        }
    }

    fn output(&self) -> Option<u64> {
        self.output
    }

    fn is_ready(&self) -> bool {
        !self.in_reset && self.edges_since_release > self.ready_latency
    }

    fn device_kind(&self) -> DeviceKind {
        DeviceKind::Software
    }
}

fn check_output_fits(layout: &OutputLayout, neuron_count: usize) -> Result<()> {
    let first = usize::from(layout.spike_offset);
    let end = first + neuron_count;
    if end > 64 {
        return Err(SnnError::invalid_parameter(format!(
            "{neuron_count} spike flags from bit {first} do not fit a 64-bit output word"
        )));
    }
    if let Some(pwm) = layout.pwm_bit {
        let pwm = usize::from(pwm);
        if pwm >= 64 || (first..end).contains(&pwm) {
            return Err(SnnError::invalid_parameter(format!(
                "PWM bit {pwm} collides with the spike flags or the word edge"
            )));
        }
    }
    Ok(())
}

/// Word-granular shift register holding `width` meaningful bits.
#[derive(Debug, Clone)]
struct ShiftRegister {
    words: VecDeque<u32>,
    capacity: usize,
    width: usize,
    data_width: u8,
    order: WordOrder,
}

impl ShiftRegister {
    fn new(width: usize, data_width: u8, order: WordOrder) -> Self {
        let capacity = width.div_ceil(usize::from(data_width.max(1)));
        Self {
            words: VecDeque::from(vec![0; capacity]),
            capacity,
            width,
            data_width,
            order,
        }
    }

    fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Oldest word is at the front; the front word is the first one loaded.
    fn shift_in(&mut self, word: u32) {
        self.words.push_back(word);
        while self.words.len() > self.capacity {
            self.words.pop_front();
        }
    }

    fn bits(&self) -> BitVector {
        let words: Vec<u32> = self.words.iter().copied().collect();
        BitVector::from_words(&words, self.data_width, self.width, self.order)
    }
}
