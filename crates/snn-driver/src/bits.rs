//! Fixed-width bit vectors for weights, inputs, and register contents
//!
//! Bit 0 is the first-loaded bit. Storage beyond `width` is always zero, so
//! complements and popcounts never leak past the vector's width.

use crate::error::{Result, SnnError};
use snn_chip::bus::WordOrder;
use std::fmt;

/// Fixed-width unsigned bit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    limbs: Vec<u64>,
    width: usize,
}

/// One bit per input synapse: 1 = excitatory (+1), 0 = inhibitory (-1).
pub type WeightVector = BitVector;

/// One bit per input line: 1 = active.
pub type InputVector = BitVector;

const LIMB: usize = 64;

impl BitVector {
    /// All-zero vector of `width` bits.
    pub fn zeros(width: usize) -> Self {
        Self {
            limbs: vec![0; width.div_ceil(LIMB)],
            width,
        }
    }

    /// Low `width` bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWidth` if `width` exceeds 64.
    pub fn from_u64(value: u64, width: usize) -> Result<Self> {
        if width > LIMB {
            return Err(SnnError::InvalidWidth {
                expected: LIMB,
                actual: width,
            });
        }
        let mut v = Self::zeros(width);
        if width > 0 {
            v.limbs[0] = value & low_mask(width);
        }
        Ok(v)
    }

    /// Vector whose bit `i` is `bits[i]`.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut v = Self::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            v.set(i, b);
        }
        v
    }

    /// Concatenate vectors; `parts[0]` occupies the lowest bits.
    pub fn concat(parts: &[BitVector]) -> Self {
        let width = parts.iter().map(BitVector::width).sum();
        let mut v = Self::zeros(width);
        let mut at = 0;
        for part in parts {
            for i in 0..part.width {
                v.set(at + i, part.get(i));
            }
            at += part.width;
        }
        v
    }

    /// Width in bits.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Bit `index`; false past the width.
    pub fn get(&self, index: usize) -> bool {
        index < self.width && (self.limbs[index / LIMB] >> (index % LIMB)) & 1 == 1
    }

    /// Set bit `index`. Writes past the width are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.width {
            return;
        }
        let bit = 1u64 << (index % LIMB);
        if value {
            self.limbs[index / LIMB] |= bit;
        } else {
            self.limbs[index / LIMB] &= !bit;
        }
    }

    /// `len` bits starting at `start`, zero-filled past the width.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let mut v = Self::zeros(len);
        for i in 0..len {
            v.set(i, self.get(start + i));
        }
        v
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.limbs.iter().map(|l| l.count_ones() as usize).sum()
    }

    /// `popcount(self AND other)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWidth` if the widths differ.
    pub fn and_count(&self, other: &Self) -> Result<usize> {
        SnnError::check_width(self.width, other.width)?;
        Ok(self
            .limbs
            .iter()
            .zip(&other.limbs)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum())
    }

    /// `popcount(self AND (NOT other))`, with `NOT` taken over the vector width.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWidth` if the widths differ.
    pub fn and_not_count(&self, other: &Self) -> Result<usize> {
        SnnError::check_width(self.width, other.width)?;
        Ok(self
            .limbs
            .iter()
            .zip(&other.limbs)
            .enumerate()
            .map(|(i, (a, b))| (a & !b & self.limb_mask(i)).count_ones() as usize)
            .sum())
    }

    /// Value as an integer, if it fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        match self.limbs.as_slice() {
            [] => Some(0),
            [one] => Some(*one),
            [first, rest @ ..] if rest.iter().all(|&l| l == 0) => Some(*first),
            _ => None,
        }
    }

    /// Split into `data_width`-bit bus words in load order.
    ///
    /// Chunk `k` holds bits `[k·data_width, (k+1)·data_width)`, zero-padded at
    /// the top. Little-endian presents chunk 0 first; big-endian presents the
    /// most significant chunk first.
    pub fn to_words(&self, data_width: u8, order: WordOrder) -> Vec<u32> {
        let w = usize::from(data_width.clamp(1, 32));
        let mut words: Vec<u32> = (0..self.width.div_ceil(w))
            .map(|k| {
                (0..w).fold(0u32, |acc, j| acc | (u32::from(self.get(k * w + j)) << j))
            })
            .collect();
        if order == WordOrder::BigEndian {
            words.reverse();
        }
        words
    }

    /// Reassemble a `width`-bit vector from bus words presented in load order.
    /// Inverse of [`BitVector::to_words`]; missing words read as zero.
    pub fn from_words(words: &[u32], data_width: u8, width: usize, order: WordOrder) -> Self {
        let w = usize::from(data_width.clamp(1, 32));
        let chunks = width.div_ceil(w);
        let mut v = Self::zeros(width);
        for (n, &word) in words.iter().enumerate().take(chunks) {
            let k = match order {
                WordOrder::LittleEndian => n,
                WordOrder::BigEndian => chunks - 1 - n,
            };
            for j in 0..w {
                v.set(k * w + j, (word >> j) & 1 == 1);
            }
        }
        v
    }

    fn limb_mask(&self, limb: usize) -> u64 {
        let start = limb * LIMB;
        low_mask(self.width.saturating_sub(start).min(LIMB))
    }
}

const fn low_mask(bits: usize) -> u64 {
    if bits >= LIMB {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Binary, most significant bit first, e.g. `0b00000001`.
impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0b")?;
        for i in (0..self.width).rev() {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u64_masks_to_width() {
        let v = BitVector::from_u64(0xFFFF, 8).unwrap();
        assert_eq!(v.to_u64(), Some(0xFF));
        assert_eq!(v.count_ones(), 8);
        assert!(BitVector::from_u64(1, 65).is_err());
    }

    #[test]
    fn complement_stays_in_width() {
        let x = BitVector::from_u64(0b1111, 4).unwrap();
        let w = BitVector::from_u64(0b0011, 4).unwrap();
        assert_eq!(x.and_count(&w).unwrap(), 2);
        assert_eq!(x.and_not_count(&w).unwrap(), 2);
    }

    #[test]
    fn width_mismatch_rejected() {
        let a = BitVector::zeros(8);
        let b = BitVector::zeros(16);
        assert!(matches!(
            a.and_count(&b),
            Err(SnnError::InvalidWidth { expected: 8, actual: 16 })
        ));
    }

    #[test]
    fn wide_vectors_span_limbs() {
        let mut v = BitVector::zeros(130);
        v.set(0, true);
        v.set(64, true);
        v.set(129, true);
        v.set(130, true); // ignored
        assert_eq!(v.count_ones(), 3);
        assert!(v.get(129));
        assert!(!v.get(130));
        assert_eq!(v.to_u64(), None);
    }

    #[test]
    fn little_endian_words_low_first() {
        let v = BitVector::from_u64(0x0201, 16).unwrap();
        assert_eq!(v.to_words(8, WordOrder::LittleEndian), vec![0x01, 0x02]);
        assert_eq!(v.to_words(8, WordOrder::BigEndian), vec![0x02, 0x01]);
    }

    #[test]
    fn words_reassemble() {
        let v = BitVector::from_u64(0b1_0110_1011, 9).unwrap();
        for order in [WordOrder::LittleEndian, WordOrder::BigEndian] {
            let words = v.to_words(4, order);
            assert_eq!(words.len(), 3);
            assert_eq!(BitVector::from_words(&words, 4, 9, order), v);
        }
    }

    #[test]
    fn concat_and_slice() {
        let a = BitVector::from_u64(0b01, 2).unwrap();
        let b = BitVector::from_u64(0b110, 3).unwrap();
        let c = BitVector::concat(&[a.clone(), b.clone()]);
        assert_eq!(c.width(), 5);
        assert_eq!(c.to_u64(), Some(0b11001));
        assert_eq!(c.slice(0, 2), a);
        assert_eq!(c.slice(2, 3), b);
    }

    #[test]
    fn display_msb_first() {
        let v = BitVector::from_u64(1, 8).unwrap();
        assert_eq!(v.to_string(), "0b00000001");
    }
}
