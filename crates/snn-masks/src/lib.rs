#![deny(unsafe_code)]

//! Sparse connectivity masks for the LIF accelerator
//!
//! This crate generates the per-layer synaptic connectivity matrices that
//! configure the chip, and reads/writes them in the `.mem` text format the
//! weight loaders consume.
//!
//! # Format
//!
//! One file per layer, one line per neuron, one `'0'`/`'1'` character per
//! synapse, newline-terminated, no separators.
//!
//! # Example
//!
//! ```no_run
//! use snn_masks::{LayerPipeline, MaskGenerator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = LayerPipeline::new(16)
//!     .layer("hidden0", 16, 0.5)
//!     .layer("hidden1", 16, 0.5)
//!     .layer("output", 8, 0.5);
//!
//! let out = plan.generate(&mut MaskGenerator::seeded(42))?;
//! out.write_files(".", |i, _| snn_masks::default_file_name(i))?;
//! println!("{}", out.total);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod error;
mod generator;
mod layer;
mod mask;
mod pipeline;

pub use error::{MaskError, Result};
pub use generator::{generate, MaskGenerator, SparsityReport};
pub use layer::Layer;
pub use mask::ConnectivityMask;
pub use pipeline::{default_file_name, GeneratedLayer, LayerPipeline, LayerSpec, PipelineOutput};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{ConnectivityMask, Layer, LayerPipeline, MaskGenerator, Result, SparsityReport};
}
