//! Layer chaining
//!
//! Each layer's fan-in is the previous layer's neuron count; the first layer
//! takes the external input width. One generator is threaded through all
//! layers so a single seed reproduces the whole network.

use crate::error::Result;
use crate::generator::{MaskGenerator, SparsityReport};
use crate::layer::Layer;
use crate::mask::ConnectivityMask;
use snn_chip::topology;
use std::path::{Path, PathBuf};
use tracing::info;

/// Neurons and density for one stage; fan-in is filled in by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    /// Layer identifier.
    pub name: String,
    /// Neurons in the layer.
    pub neurons: usize,
    /// Connection probability.
    pub density: f64,
}

/// Ordered layer plan fed by an external input vector.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPipeline {
    input_width: usize,
    specs: Vec<LayerSpec>,
}

/// One generated stage.
#[derive(Debug, Clone)]
pub struct GeneratedLayer {
    /// Resolved layer shape.
    pub layer: Layer,
    /// Generated mask.
    pub mask: ConnectivityMask,
    /// Counts for this layer.
    pub report: SparsityReport,
}

/// All generated stages plus the accumulated counts.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Stages in order.
    pub layers: Vec<GeneratedLayer>,
    /// Counts summed over every stage.
    pub total: SparsityReport,
}

impl LayerPipeline {
    /// Empty pipeline with the given external input width.
    pub fn new(input_width: usize) -> Self {
        Self {
            input_width,
            specs: Vec::new(),
        }
    }

    /// Default three-layer plan of the shuttle die (16 → 16 → 16 → 8).
    pub fn default_plan() -> Self {
        Self::default_layers(topology::INPUT_WIDTH)
    }

    /// The default layer stack fed by `input_width` external lines.
    pub fn default_layers(input_width: usize) -> Self {
        topology::DEFAULT_LAYERS.iter().enumerate().fold(
            Self::new(input_width),
            |p, (i, plan)| p.layer(format!("layer{i}"), plan.neurons, plan.density),
        )
    }

    /// Append a stage.
    #[must_use]
    pub fn layer(mut self, name: impl Into<String>, neurons: usize, density: f64) -> Self {
        self.specs.push(LayerSpec {
            name: name.into(),
            neurons,
            density,
        });
        self
    }

    /// External input width.
    pub const fn input_width(&self) -> usize {
        self.input_width
    }

    /// Stages in order.
    pub fn specs(&self) -> &[LayerSpec] {
        &self.specs
    }

    /// Resolve fan-ins by chaining neuron counts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayer` if any stage has an invalid shape.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        let mut fan_in = self.input_width;
        self.specs
            .iter()
            .map(|spec| -> Result<Layer> {
                let layer = Layer::new(spec.name.clone(), fan_in, spec.neurons, spec.density)?;
                fan_in = spec.neurons;
                Ok(layer)
            })
            .collect()
    }

    /// Generate every stage with one generator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayer` or `ShapeMismatch` from the failing stage.
    pub fn generate(&self, generator: &mut MaskGenerator) -> Result<PipelineOutput> {
        let mut layers = Vec::with_capacity(self.specs.len());
        let mut total = SparsityReport::default();

        for layer in self.layers()? {
            let mask = generator.generate(&layer)?;
            let report = SparsityReport::of(&mask);
            total = total.merge(report);
            layers.push(GeneratedLayer { layer, mask, report });
        }

        info!(
            "Total connections {} out of {} possible",
            total.connected, total.total
        );
        Ok(PipelineOutput { layers, total })
    }
}

/// `connections_<index>.mem`
pub fn default_file_name(index: usize) -> String {
    format!("connections_{index}.mem")
}

impl PipelineOutput {
    /// Write each stage to `dir`, naming files with `name_of(index, layer)`.
    /// Returns the written paths in stage order.
    ///
    /// # Errors
    ///
    /// Returns `Io` on the first write failure; earlier files stay written.
    pub fn write_files<F>(&self, dir: impl AsRef<Path>, name_of: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(usize, &Layer) -> String,
    {
        let dir = dir.as_ref();
        let mut paths = Vec::with_capacity(self.layers.len());
        for (i, stage) in self.layers.iter().enumerate() {
            let path = dir.join(name_of(i, &stage.layer));
            info!("Writing connection mask to {}, {}", path.display(), stage.report);
            stage.mask.write_to(&path)?;
            paths.push(path);
        }
        Ok(paths)
    }
}
