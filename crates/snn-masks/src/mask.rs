//! Connectivity mask storage and `.mem` text format
//!
//! A mask is `neuron_count` rows of `fan_in` bits. On disk it is one line per
//! neuron, one `'0'`/`'1'` character per synapse, newline-terminated:
//!
//! ```text
//! 1011001011100101
//! 0110100111010010
//! ...
//! ```

use crate::error::{MaskError, Result};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Sparse binary connectivity matrix for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityMask {
    fan_in: usize,
    bits: Vec<bool>,
}

impl ConnectivityMask {
    /// Partition a flat sample sequence into `groups` contiguous rows, in draw
    /// order: row `i` is `samples[i * fan_in..(i + 1) * fan_in]`.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the samples do not split into `groups`
    /// non-empty rows of equal length.
    pub fn partition(samples: Vec<bool>, groups: usize) -> Result<Self> {
        if groups == 0 || samples.is_empty() || samples.len() % groups != 0 {
            return Err(MaskError::ShapeMismatch {
                total: samples.len(),
                groups,
            });
        }
        Ok(Self {
            fan_in: samples.len() / groups,
            bits: samples,
        })
    }

    /// Build from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if there are no rows, a row is empty, or rows
    /// differ in length.
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R]) -> Result<Self> {
        let fan_in = rows.first().map_or(0, |r| r.as_ref().len());
        let mut bits = Vec::with_capacity(fan_in * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.len() != fan_in {
                return Err(MaskError::ShapeMismatch {
                    total: bits.len() + row.len(),
                    groups: rows.len(),
                });
            }
            bits.extend_from_slice(row);
        }
        Self::partition(bits, rows.len())
    }

    /// Bits per row.
    pub const fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Number of rows (neurons).
    pub fn neuron_count(&self) -> usize {
        self.bits.len() / self.fan_in
    }

    /// Row `index`, if present.
    pub fn row(&self, index: usize) -> Option<&[bool]> {
        let start = index.checked_mul(self.fan_in)?;
        self.bits.get(start..start.checked_add(self.fan_in)?)
    }

    /// Rows in neuron order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[bool]> + '_ {
        self.bits.chunks_exact(self.fan_in)
    }

    /// All bits, row-major.
    pub fn as_flat(&self) -> &[bool] {
        &self.bits
    }

    /// Connected synapses.
    pub fn connected(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Synapse slots.
    pub fn total(&self) -> usize {
        self.bits.len()
    }

    /// Serialize to the `.mem` text format.
    #[must_use]
    pub fn to_mem_string(&self) -> String {
        let mut out = String::with_capacity(self.bits.len() + self.neuron_count());
        for row in self.rows() {
            out.extend(row.iter().map(|&b| if b { '1' } else { '0' }));
            out.push('\n');
        }
        out
    }

    /// Parse the `.mem` text format. Blank lines and a trailing `\r` are
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns `Parse` on any character other than `'0'`/`'1'`, on a row whose
    /// length differs from the first row, or when no rows are present.
    pub fn parse_mem(text: &str) -> Result<Self> {
        let mut fan_in = None;
        let mut bits = Vec::new();
        let mut rows = 0usize;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let width = *fan_in.get_or_insert(line.len());
            if line.len() != width {
                return Err(MaskError::parse(
                    i + 1,
                    format!("row has {} bits, expected {width}", line.len()),
                ));
            }
            for c in line.chars() {
                match c {
                    '0' => bits.push(false),
                    '1' => bits.push(true),
                    other => {
                        return Err(MaskError::parse(i + 1, format!("unexpected character {other:?}")))
                    }
                }
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(MaskError::parse(0, "mask has no rows"));
        }
        Self::partition(bits, rows)
    }

    /// Write the `.mem` text to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_mem_string())?;
        tracing::debug!(
            "Wrote {}×{} mask to {}",
            self.neuron_count(),
            self.fan_in,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read a `.mem` file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or `Parse` if it is malformed.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse_mem(&text)
    }
}

impl FromStr for ConnectivityMask {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_mem(s)
    }
}

impl std::fmt::Display for ConnectivityMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_mem_string())
    }
}
