//! Default network topology and neuron reset parameters.
//!
//! The shuttle die carries three fully-programmable layers fed by a 16-bit
//! input vector. Layer `k + 1` takes layer `k`'s neurons as its inputs.
//!
//! ```text
//! input(16) ─► L0: 16 neurons ─► L1: 16 neurons ─► L2: 8 neurons
//!              256 synapses      256 synapses      128 synapses
//! ```

/// Width of the external input vector.
pub const INPUT_WIDTH: usize = 16;

/// One stage of the default layer plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlan {
    /// Neurons in the layer.
    pub neurons: usize,
    /// Probability that a synapse is connected.
    pub density: f64,
}

/// Layer plan of the shuttle die, written as `connections_<i>.mem`.
pub const DEFAULT_LAYERS: [LayerPlan; 3] = [
    LayerPlan { neurons: 16, density: 0.5 },
    LayerPlan { neurons: 16, density: 0.5 },
    LayerPlan { neurons: 8, density: 0.5 },
];

/// Total synapse slots across [`DEFAULT_LAYERS`].
#[must_use]
pub fn default_synapse_count() -> usize {
    let mut fan_in = INPUT_WIDTH;
    let mut total = 0;
    for layer in DEFAULT_LAYERS {
        total += fan_in * layer.neurons;
        fan_in = layer.neurons;
    }
    total
}

/// Neuron state applied by reset.
pub mod reset_state {
    /// Decay shift after reset (no leak).
    pub const SHIFT: u32 = 0;
    /// Firing threshold after reset.
    pub const THRESHOLD: i32 = 5;
    /// Membrane potential after reset.
    pub const MEMBRANE: i32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_synapses() {
        // 16×16 + 16×16 + 16×8
        assert_eq!(default_synapse_count(), 640);
    }

    #[test]
    fn weight_words_for_plan() {
        // 640 synapse bits fill exactly 80 byte-wide weight words.
        assert_eq!(default_synapse_count() % 8, 0);
        assert_eq!(default_synapse_count() / 8, 80);
    }
}
