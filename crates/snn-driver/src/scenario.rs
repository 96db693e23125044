//! Scenario files
//!
//! A scenario is data, not code: one TOML table describes the die, the
//! stimulus, and the neuron parameters of a full `RESET → … → DONE` run.
//!
//! ```toml
//! name = "single-input"
//! bus = "gfmpw"
//! neuron_count = 1
//! fan_in = 8
//! input_pattern = 0x01
//! execute_cycles = 32
//! threshold = 5
//!
//! [weight_pattern]
//! kind = "fixed"
//! bits = 0xFF
//! ```

use crate::backends::SoftwareDevice;
use crate::bits::{BitVector, InputVector, WeightVector};
use crate::error::{Result, SnnError};
use crate::protocol::{ProtocolTiming, Sequence};
use crate::reference::NeuronParams;
use serde::{Deserialize, Serialize};
use snn_chip::bus::{BusLayout, OutputLayout};
use snn_chip::{timing, topology::reset_state};
use snn_masks::{ConnectivityMask, Layer, MaskGenerator};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Die revision: a preset name or an explicit layout table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusSpec {
    /// One of [`BusLayout::PRESETS`].
    Preset(String),
    /// Explicit field placement.
    Custom(BusLayout),
}

impl BusSpec {
    /// Resolve to a concrete layout.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unknown preset name.
    pub fn layout(&self) -> Result<BusLayout> {
        match self {
            Self::Preset(name) => BusLayout::preset(name).ok_or_else(|| {
                let known: Vec<&str> = BusLayout::PRESETS.iter().map(|(n, _)| *n).collect();
                SnnError::config(format!(
                    "unknown bus preset {name:?} (known: {})",
                    known.join(", ")
                ))
            }),
            Self::Custom(layout) => Ok(*layout),
        }
    }
}

impl Default for BusSpec {
    fn default() -> Self {
        Self::Preset("gfmpw".to_string())
    }
}

/// Where the weights come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightPattern {
    /// Every synapse connected, whatever the die's width.
    AllConnected,
    /// Same `fan_in`-bit pattern for every neuron.
    Fixed {
        /// Bit 0 = synapse 0.
        bits: u64,
    },
    /// One pattern per neuron.
    Rows {
        /// `rows[i]` is neuron `i`.
        rows: Vec<u64>,
    },
    /// Raw bus words in load order.
    Words {
        /// Exactly one register's worth.
        words: Vec<u32>,
    },
    /// Random connectivity mask for the die's shape.
    Generated {
        /// Connection probability.
        density: f64,
        /// Seed; fresh mask every run when absent.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// A `.mem` file, relative to the scenario file.
    MaskFile {
        /// Path to the mask.
        path: PathBuf,
    },
}

impl Default for WeightPattern {
    fn default() -> Self {
        Self::AllConnected
    }
}

/// Knobs of the software device, for fault scenarios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Extra edges after release before ready.
    pub ready_latency: u32,
    /// Stop resolving outputs after this many execute edges.
    pub output_dropout: Option<usize>,
}

/// One complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Label for logs.
    pub name: String,
    /// Die revision.
    pub bus: BusSpec,
    /// Output bit assignment.
    pub output: OutputLayout,
    /// Neurons on the die.
    pub neuron_count: usize,
    /// Synapses per neuron (input width).
    pub fan_in: usize,
    /// Weights.
    pub weight_pattern: WeightPattern,
    /// Input bits, bit 0 = input line 0.
    pub input_pattern: u64,
    /// Execute edges to capture.
    pub execute_cycles: usize,
    /// Decay shift.
    pub shift: u32,
    /// Firing threshold.
    pub threshold: i32,
    /// Idle edges after each setup segment.
    pub settle_cycles: u32,
    /// Edges reset is held.
    pub reset_cycles: u32,
    /// Release edges allowed before ready.
    pub ready_timeout_cycles: u32,
    /// Software device knobs.
    pub device: DeviceConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "scenario".to_string(),
            bus: BusSpec::default(),
            output: OutputLayout::default(),
            neuron_count: 1,
            fan_in: 8,
            weight_pattern: WeightPattern::default(),
            input_pattern: 0,
            execute_cycles: timing::DEFAULT_EXECUTE_CYCLES as usize,
            shift: reset_state::SHIFT,
            threshold: reset_state::THRESHOLD,
            settle_cycles: timing::MIN_SETTLE_CYCLES,
            reset_cycles: timing::RESET_CYCLES,
            ready_timeout_cycles: timing::DEFAULT_READY_TIMEOUT_CYCLES,
            device: DeviceConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Load and validate a scenario file. Relative mask paths resolve
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Config` if it does not parse
    /// or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        if let (WeightPattern::MaskFile { path: mask }, Some(dir)) =
            (&mut config.weight_pattern, path.parent())
        {
            if mask.is_relative() {
                *mask = dir.join(&*mask);
            }
        }
        config.validate()?;
        debug!("Loaded scenario {:?} from {}", config.name, path.display());
        Ok(config)
    }

    /// Parse and validate a scenario from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text does not parse or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns `Config` listing each problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        match self.bus.layout() {
            Ok(layout) => {
                if let Err(e) = layout.validate() {
                    errors.push(format!("bus: {e}"));
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        if self.neuron_count == 0 || self.neuron_count > 64 {
            errors.push(format!("neuron_count must be 1..=64, got {}", self.neuron_count));
        }
        if self.fan_in == 0 || self.fan_in > 64 {
            errors.push(format!("fan_in must be 1..=64, got {}", self.fan_in));
        }
        if self.execute_cycles == 0 {
            errors.push("execute_cycles must be at least 1".to_string());
        }
        if self.threshold <= 0 {
            errors.push(format!("threshold must be > 0, got {}", self.threshold));
        }
        if let Err(e) = self.timing().validate() {
            errors.push(e.to_string());
        }
        match &self.weight_pattern {
            WeightPattern::Rows { rows } if rows.len() != self.neuron_count => errors.push(format!(
                "weight_pattern has {} rows for {} neurons",
                rows.len(),
                self.neuron_count
            )),
            WeightPattern::Generated { density, .. } if !(0.0..=1.0).contains(density) => {
                errors.push(format!("density must be in [0, 1], got {density}"));
            }
            _ => {}
        }
        if (1..=64).contains(&self.fan_in) {
            if let Err(e) = pattern_bits(self.input_pattern, self.fan_in) {
                errors.push(format!("input_pattern: {e}"));
            }
            let fixed = match &self.weight_pattern {
                WeightPattern::Fixed { bits } => std::slice::from_ref(bits),
                WeightPattern::Rows { rows } => rows.as_slice(),
                _ => &[],
            };
            for (i, &bits) in fixed.iter().enumerate() {
                if let Err(e) = pattern_bits(bits, self.fan_in) {
                    errors.push(format!("weight_pattern row {i}: {e}"));
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        let listing = errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(SnnError::config(format!(
            "scenario {:?} is invalid:\n{listing}",
            self.name
        )))
    }

    /// Bus layout.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unknown preset.
    pub fn layout(&self) -> Result<BusLayout> {
        self.bus.layout()
    }

    /// Reset and settle budgets.
    pub const fn timing(&self) -> ProtocolTiming {
        ProtocolTiming {
            reset_cycles: self.reset_cycles,
            settle_cycles: self.settle_cycles,
            ready_timeout_cycles: self.ready_timeout_cycles,
        }
    }

    /// Decay and threshold.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `threshold > 0`.
    pub fn params(&self) -> Result<NeuronParams> {
        NeuronParams::new(self.shift, self.threshold)
    }

    /// Input vector of `fan_in` bits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWidth` if `fan_in` exceeds 64 or the pattern sets a
    /// bit at or above `fan_in`.
    pub fn input(&self) -> Result<InputVector> {
        pattern_bits(self.input_pattern, self.fan_in)
    }

    /// One weight vector per neuron, in row order.
    ///
    /// # Errors
    ///
    /// Fails if a mask cannot be generated or read, or its shape does not
    /// match the die.
    pub fn weight_rows(&self) -> Result<Vec<WeightVector>> {
        match &self.weight_pattern {
            WeightPattern::AllConnected => {
                let row = BitVector::from_bits(&vec![true; self.fan_in]);
                Ok(vec![row; self.neuron_count])
            }
            WeightPattern::Fixed { bits } => {
                let row = pattern_bits(*bits, self.fan_in)?;
                Ok(vec![row; self.neuron_count])
            }
            WeightPattern::Rows { rows } => rows
                .iter()
                .map(|&r| pattern_bits(r, self.fan_in))
                .collect(),
            WeightPattern::Words { words } => {
                let layout = self.layout()?;
                let width = self.neuron_count * self.fan_in;
                let expected = width.div_ceil(usize::from(layout.data_width));
                if words.len() != expected {
                    return Err(SnnError::config(format!(
                        "weight_pattern has {} words, the register takes {expected}",
                        words.len()
                    )));
                }
                let register =
                    BitVector::from_words(words, layout.data_width, width, layout.word_order);
                Ok((0..self.neuron_count)
                    .map(|i| register.slice(i * self.fan_in, self.fan_in))
                    .collect())
            }
            WeightPattern::Generated { density, seed } => {
                let layer = Layer::new(&self.name, self.fan_in, self.neuron_count, *density)?;
                let mask = MaskGenerator::new(*seed).generate(&layer)?;
                Ok(mask_rows(&mask))
            }
            WeightPattern::MaskFile { path } => {
                let mask = ConnectivityMask::read_from(path)?;
                if mask.neuron_count() != self.neuron_count || mask.fan_in() != self.fan_in {
                    return Err(SnnError::config(format!(
                        "{} is {}×{}, die is {}×{}",
                        path.display(),
                        mask.neuron_count(),
                        mask.fan_in(),
                        self.neuron_count,
                        self.fan_in
                    )));
                }
                Ok(mask_rows(&mask))
            }
        }
    }

    /// Protocol sequence loading `weights` and the input pattern, then
    /// executing.
    ///
    /// # Errors
    ///
    /// Fails if the layout or input cannot be resolved.
    pub fn sequence(&self, weights: &[WeightVector]) -> Result<Sequence> {
        let layout = self.layout()?;
        let register = BitVector::concat(weights);
        let weight_words = register.to_words(layout.data_width, layout.word_order);
        let input_words = self
            .input()?
            .to_words(layout.data_width, layout.word_order);
        Ok(Sequence::standard(
            weight_words,
            input_words,
            self.settle_cycles,
            self.execute_cycles,
        ))
    }

    /// Software device shaped like this scenario's die.
    ///
    /// # Errors
    ///
    /// Fails if the layout or parameters are invalid.
    pub fn software_device(&self) -> Result<SoftwareDevice> {
        let mut dev = SoftwareDevice::new(
            self.layout()?,
            self.neuron_count,
            self.fan_in,
            self.params()?,
        )?
        .with_output_layout(self.output)?
        .with_ready_latency(self.device.ready_latency);
        if let Some(n) = self.device.output_dropout {
            dev = dev.with_output_dropout(n);
        }
        Ok(dev)
    }
}

/// `value` as a `width`-bit vector; bits at or above `width` are an error,
/// not silently dropped.
fn pattern_bits(value: u64, width: usize) -> Result<BitVector> {
    let used = (u64::BITS - value.leading_zeros()) as usize;
    if used > width {
        return Err(SnnError::InvalidWidth {
            expected: width,
            actual: used,
        });
    }
    BitVector::from_u64(value, width)
}

fn mask_rows(mask: &ConnectivityMask) -> Vec<WeightVector> {
    mask.rows().map(BitVector::from_bits).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use snn_chip::bus::WordOrder;

    #[test]
    fn defaults_match_bring_up() {
        let c = ScenarioConfig::default();
        assert_eq!(c.layout().unwrap(), BusLayout::GFMPW);
        assert_eq!(c.execute_cycles, 32);
        assert_eq!(c.reset_cycles, 10);
        assert_eq!(c.settle_cycles, 1);
        assert_eq!(c.params().unwrap(), NeuronParams::new(0, 5).unwrap());
        c.validate().unwrap();
    }

    #[test]
    fn parses_fixed_pattern() {
        let c = ScenarioConfig::from_toml_str(
            r#"
            name = "one"
            input_pattern = 1
            [weight_pattern]
            kind = "fixed"
            bits = 255
            "#,
        )
        .unwrap();
        let rows = c.weight_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_u64(), Some(0xFF));
        assert_eq!(c.input().unwrap().to_u64(), Some(1));
    }

    #[test]
    fn oversized_patterns_rejected() {
        let c = ScenarioConfig {
            fan_in: 8,
            input_pattern: 0x1FF,
            weight_pattern: WeightPattern::Fixed { bits: 0x3FF },
            ..ScenarioConfig::default()
        };
        let msg = c.validate().unwrap_err().to_string();
        assert!(msg.contains("input_pattern"));
        assert!(msg.contains("weight_pattern row 0"));
        assert!(matches!(
            c.input(),
            Err(SnnError::InvalidWidth { expected: 8, actual: 9 })
        ));
        assert!(matches!(
            c.weight_rows(),
            Err(SnnError::InvalidWidth { expected: 8, actual: 10 })
        ));

        let rows = ScenarioConfig {
            neuron_count: 2,
            input_pattern: 0xFF,
            weight_pattern: WeightPattern::Rows { rows: vec![0xFF, 0x100] },
            ..c
        };
        let msg = rows.validate().unwrap_err().to_string();
        assert!(msg.contains("weight_pattern row 1"));
        assert!(!msg.contains("input_pattern"));
    }

    #[test]
    fn all_connected_spans_fan_in() {
        for fan_in in [1, 8, 16, 64] {
            let c = ScenarioConfig { fan_in, ..ScenarioConfig::default() };
            c.validate().unwrap();
            let rows = c.weight_rows().unwrap();
            assert_eq!(rows[0].width(), fan_in);
            assert_eq!(rows[0].count_ones(), fan_in);
        }
        let c = ScenarioConfig::from_toml_str("[weight_pattern]\nkind = \"all_connected\"").unwrap();
        assert_eq!(c.weight_pattern, WeightPattern::AllConnected);
    }

    #[test]
    fn parses_custom_bus_table() {
        let c = ScenarioConfig::from_toml_str(
            r#"
            [bus]
            n_reset_bit = 0
            mode_offset = 1
            mode_width = 2
            data_offset = 3
            data_width = 16
            word_order = "big_endian"
            modes = { input = 0, weights = 1, idle = 3, execute = 2 }
            "#,
        )
        .unwrap();
        let layout = c.layout().unwrap();
        assert_eq!(layout.data_width, 16);
        assert_eq!(layout.word_order, WordOrder::BigEndian);
    }

    #[test]
    fn unknown_preset_rejected() {
        let err = ScenarioConfig::from_toml_str(r#"bus = "sky130""#).unwrap_err();
        assert!(err.to_string().contains("sky130"));
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(matches!(
            ScenarioConfig::from_toml_str("execute_cyles = 4"),
            Err(SnnError::Config { .. })
        ));
    }

    #[test]
    fn validation_lists_every_problem() {
        let c = ScenarioConfig {
            neuron_count: 0,
            threshold: 0,
            execute_cycles: 0,
            ..ScenarioConfig::default()
        };
        let msg = c.validate().unwrap_err().to_string();
        assert!(msg.contains("neuron_count"));
        assert!(msg.contains("threshold"));
        assert!(msg.contains("execute_cycles"));
    }

    #[test]
    fn raw_words_split_into_rows() {
        let c = ScenarioConfig {
            neuron_count: 2,
            fan_in: 8,
            weight_pattern: WeightPattern::Words { words: vec![0x0F, 0xF0] },
            ..ScenarioConfig::default()
        };
        let rows = c.weight_rows().unwrap();
        assert_eq!(rows[0].to_u64(), Some(0x0F));
        assert_eq!(rows[1].to_u64(), Some(0xF0));

        let short = ScenarioConfig {
            weight_pattern: WeightPattern::Words { words: vec![] },
            ..c
        };
        assert!(short.weight_rows().is_err());
    }

    #[test]
    fn seeded_generation_is_stable() {
        let c = ScenarioConfig {
            neuron_count: 4,
            fan_in: 16,
            weight_pattern: WeightPattern::Generated { density: 0.5, seed: Some(7) },
            ..ScenarioConfig::default()
        };
        assert_eq!(c.weight_rows().unwrap(), c.weight_rows().unwrap());
    }

    #[test]
    fn standard_sequence_lengths() {
        let c = ScenarioConfig {
            neuron_count: 2,
            fan_in: 16,
            ..ScenarioConfig::default()
        };
        let seq = c.sequence(&c.weight_rows().unwrap()).unwrap();
        // 32 weight bits → 4 words, 16 input bits → 2 words
        assert_eq!(seq.cycles(), 4 + 1 + 2 + 1 + 32);
    }
}
