//! Layer shape definitions

use crate::error::{MaskError, Result};

/// One stage of the connectivity pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    fan_in: usize,
    neuron_count: usize,
    density: f64,
}

impl Layer {
    /// Create a layer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayer` if `fan_in` or `neuron_count` is zero, or if
    /// `density` is not a finite value in `[0, 1]`.
    pub fn new(
        name: impl Into<String>,
        fan_in: usize,
        neuron_count: usize,
        density: f64,
    ) -> Result<Self> {
        let name = name.into();
        if fan_in == 0 {
            return Err(MaskError::invalid_layer(format!("{name}: fan_in must be >= 1")));
        }
        if neuron_count == 0 {
            return Err(MaskError::invalid_layer(format!(
                "{name}: neuron_count must be >= 1"
            )));
        }
        if !(0.0..=1.0).contains(&density) {
            return Err(MaskError::invalid_layer(format!(
                "{name}: density {density} outside [0, 1]"
            )));
        }
        Ok(Self {
            name,
            fan_in,
            neuron_count,
            density,
        })
    }

    /// Layer identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inputs per neuron.
    pub const fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Neurons in the layer.
    pub const fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    /// Connection probability.
    pub const fn density(&self) -> f64 {
        self.density
    }

    /// Synapse slots in the layer (`neuron_count × fan_in`).
    pub const fn synapse_count(&self) -> usize {
        self.neuron_count * self.fan_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_shapes() {
        assert!(Layer::new("l0", 0, 16, 0.5).is_err());
        assert!(Layer::new("l0", 16, 0, 0.5).is_err());
    }

    #[test]
    fn rejects_bad_density() {
        assert!(Layer::new("l0", 16, 16, 1.5).is_err());
        assert!(Layer::new("l0", 16, 16, -0.1).is_err());
        assert!(Layer::new("l0", 16, 16, f64::NAN).is_err());
    }

    #[test]
    fn synapse_count() {
        let layer = Layer::new("l2", 16, 8, 0.5).unwrap();
        assert_eq!(layer.synapse_count(), 128);
        assert_eq!(layer.name(), "l2");
    }
}
