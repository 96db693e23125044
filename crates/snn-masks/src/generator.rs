//! Seeded Bernoulli mask generation

use crate::error::Result;
use crate::layer::Layer;
use crate::mask::ConnectivityMask;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Connected/total synapse counts, for operator visibility only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparsityReport {
    /// Connected synapses.
    pub connected: usize,
    /// Synapse slots.
    pub total: usize,
}

impl SparsityReport {
    /// Counts for an existing mask.
    pub fn of(mask: &ConnectivityMask) -> Self {
        Self {
            connected: mask.connected(),
            total: mask.total(),
        }
    }

    /// `100 · (1 − connected / total)`; zero for an empty report.
    #[allow(clippy::cast_precision_loss)]
    pub fn sparsity_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 - 100.0 * self.connected as f64 / self.total as f64
    }

    /// Accumulate another report.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            connected: self.connected + other.connected,
            total: self.total + other.total,
        }
    }
}

impl std::fmt::Display for SparsityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sparsity {:.2}%, {} connections out of {} possible",
            self.sparsity_percent(),
            self.connected,
            self.total
        )
    }
}

/// Mask generator owning its pseudorandom source.
///
/// A seeded generator replays the same draw sequence; an unseeded one draws
/// from OS entropy. Generators are not shared: give concurrent generations
/// their own instance (and distinct seeds).
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    rng: StdRng,
    seed: Option<u64>,
}

impl MaskGenerator {
    /// Reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Fresh generator; every run yields a different mask.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    /// Seeded when `seed` is given, entropy-backed otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Seed this generator was built from, if any.
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Draw `neuron_count × fan_in` Bernoulli(density) samples and partition
    /// them into rows in draw order.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the samples cannot be partitioned.
    pub fn generate(&mut self, layer: &Layer) -> Result<ConnectivityMask> {
        let samples: Vec<bool> = (0..layer.synapse_count())
            .map(|_| self.rng.gen_bool(layer.density()))
            .collect();
        let mask = ConnectivityMask::partition(samples, layer.neuron_count())?;

        let report = SparsityReport::of(&mask);
        info!(
            "Generated mask {} ({}×{}): {report}",
            layer.name(),
            layer.neuron_count(),
            layer.fan_in()
        );
        Ok(mask)
    }
}

/// One-shot generation: `generate(layer, seed)`.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the samples cannot be partitioned.
pub fn generate(layer: &Layer, seed: Option<u64>) -> Result<(ConnectivityMask, SparsityReport)> {
    let mask = MaskGenerator::new(seed).generate(layer)?;
    let report = SparsityReport::of(&mask);
    Ok((mask, report))
}
