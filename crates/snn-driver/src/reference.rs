//! Golden reference model of the neuron's integer arithmetic
//!
//! One leaky integrate-and-fire step, bit-exact with the silicon:
//!
//! ```text
//! psp       = popcount(x & w) − popcount(x & ~w)
//! decayed_u = last_u − (last_u >> shift)        (shift > 0, arithmetic shift)
//! u         = psp + decayed_u
//! spike     = u ≥ threshold;  on spike u −= threshold  (single subtraction)
//! ```
//!
//! The model is stateless: callers thread `last_u` through successive calls.

use crate::bits::{InputVector, WeightVector};
use crate::error::{Result, SnnError};
use snn_chip::topology::reset_state;

/// Decay and firing parameters shared by every neuron on the die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronParams {
    shift: u32,
    threshold: i32,
}

impl NeuronParams {
    /// Create parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless `threshold > 0`.
    pub fn new(shift: u32, threshold: i32) -> Result<Self> {
        if threshold <= 0 {
            return Err(SnnError::invalid_parameter(format!(
                "threshold must be > 0, got {threshold}"
            )));
        }
        Ok(Self { shift, threshold })
    }

    /// Decay shift (0 = no leak).
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Firing threshold.
    pub const fn threshold(&self) -> i32 {
        self.threshold
    }

    /// `last_u − (last_u >> shift)`, flooring toward −∞; identity at shift 0.
    pub const fn decay(&self, last_u: i32) -> i32 {
        if self.shift == 0 {
            return last_u;
        }
        // i32 >> 31 already saturates to 0 / −1
        let s = if self.shift > 31 { 31 } else { self.shift };
        last_u - (last_u >> s)
    }
}

/// State applied by a device reset: no leak, threshold 5.
impl Default for NeuronParams {
    fn default() -> Self {
        Self {
            shift: reset_state::SHIFT,
            threshold: reset_state::THRESHOLD,
        }
    }
}

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronOutput {
    /// Whether the neuron fired.
    pub spike: bool,
    /// Membrane potential after integration (and reset, on spike).
    pub u: i32,
}

/// Signed postsynaptic sum: +1 per active connected input, −1 per active
/// unconnected input.
///
/// # Errors
///
/// Returns `InvalidWidth` if `x` and `w` differ in width.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn psp(x: &InputVector, w: &WeightVector) -> Result<i32> {
    let excitatory = x.and_count(w)? as i32;
    let inhibitory = x.and_not_count(w)? as i32;
    Ok(excitatory - inhibitory)
}

/// One LIF step.
///
/// # Errors
///
/// Returns `InvalidWidth` if `x` and `w` differ in width.
pub fn neuron_step(
    x: &InputVector,
    w: &WeightVector,
    last_u: i32,
    params: NeuronParams,
) -> Result<NeuronOutput> {
    Ok(integrate(psp(x, w)?, last_u, params))
}

/// Decay, integrate, and fire given a precomputed postsynaptic sum.
pub fn integrate(psp: i32, last_u: i32, params: NeuronParams) -> NeuronOutput {
    let u = psp.saturating_add(params.decay(last_u));
    if u >= params.threshold {
        NeuronOutput {
            spike: true,
            u: u - params.threshold,
        }
    } else {
        NeuronOutput { spike: false, u }
    }
}

/// Run `steps` successive steps with constant `x`, `w`, and parameters,
/// starting from `u = 0`.
///
/// # Errors
///
/// Returns `InvalidWidth` if `x` and `w` differ in width.
pub fn spike_train(
    x: &InputVector,
    w: &WeightVector,
    params: NeuronParams,
    steps: usize,
) -> Result<Vec<NeuronOutput>> {
    let drive = psp(x, w)?;
    let mut u = reset_state::MEMBRANE;
    Ok((0..steps)
        .map(|_| {
            let out = integrate(drive, u, params);
            u = out.u;
            out
        })
        .collect())
}

/// Decode a PWM output pin into a membrane estimate: an exponential moving
/// average with `alpha = 1 / bits²`, scaled by `2^bits`. Returns the running
/// estimate after every sample.
pub fn pwm_estimate(samples: &[bool], bits: u32) -> Vec<f64> {
    let bits = bits.max(1);
    let alpha = 1.0 / f64::from(bits * bits);
    let scale = f64::from(bits).exp2();
    let mut avg = 0.0;
    samples
        .iter()
        .map(|&s| {
            avg = alpha * f64::from(u8::from(s)) + (1.0 - alpha) * avg;
            scale * avg
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitVector;
    use proptest::prelude::*;

    fn v8(value: u64) -> BitVector {
        BitVector::from_u64(value, 8).unwrap()
    }

    #[test]
    fn single_active_connected_input() {
        let params = NeuronParams::new(0, 5).unwrap();
        let out = neuron_step(&v8(0b0000_0001), &v8(0b1111_1111), 0, params).unwrap();
        assert_eq!(out, NeuronOutput { spike: false, u: 1 });
    }

    #[test]
    fn fifth_step_spikes_and_resets() {
        let params = NeuronParams::new(0, 5).unwrap();
        let (x, w) = (v8(0b0000_0001), v8(0b1111_1111));
        let mut u = 0;
        let mut trace = Vec::new();
        for _ in 0..5 {
            let out = neuron_step(&x, &w, u, params).unwrap();
            u = out.u;
            trace.push((out.spike, out.u));
        }
        assert_eq!(
            trace,
            vec![(false, 1), (false, 2), (false, 3), (false, 4), (true, 0)]
        );
    }

    #[test]
    fn spike_train_matches_manual_threading() {
        let params = NeuronParams::default();
        let train = spike_train(&v8(1), &v8(0xFF), params, 10).unwrap();
        let spikes: Vec<bool> = train.iter().map(|o| o.spike).collect();
        assert_eq!(spikes.iter().filter(|&&s| s).count(), 2);
        assert!(spikes[4] && spikes[9]);
    }

    #[test]
    fn inhibitory_inputs_subtract() {
        // x = 1011_1011 (6 active), w = 0000_1111 → +3 −3
        assert_eq!(psp(&v8(0b1011_1011), &v8(0b0000_1111)).unwrap(), 0);
        assert_eq!(psp(&v8(0b1111_0000), &v8(0b0000_1111)).unwrap(), -4);
    }

    #[test]
    fn decay_floors_negative_potentials() {
        let p = NeuronParams::new(1, 5).unwrap();
        // -3 >> 1 == -2 → -3 - (-2) == -1
        assert_eq!(p.decay(-3), -1);
        assert_eq!(p.decay(7), 4);
        let p = NeuronParams::new(40, 5).unwrap();
        assert_eq!(p.decay(-3), -2);
        assert_eq!(p.decay(3), 3);
    }

    #[test]
    fn single_subtraction_on_large_overshoot() {
        let p = NeuronParams::new(0, 5).unwrap();
        let out = integrate(12, 0, p);
        assert_eq!(out, NeuronOutput { spike: true, u: 7 });
    }

    #[test]
    fn width_mismatch_fails_fast() {
        let x = BitVector::zeros(8);
        let w = BitVector::zeros(16);
        let err = neuron_step(&x, &w, 0, NeuronParams::default()).unwrap_err();
        assert!(matches!(err, SnnError::InvalidWidth { expected: 8, actual: 16 }));
    }

    #[test]
    fn threshold_must_be_positive() {
        assert!(NeuronParams::new(0, 0).is_err());
        assert!(NeuronParams::new(0, -1).is_err());
    }

    #[test]
    fn pwm_estimate_converges_up() {
        let est = pwm_estimate(&[true; 200], 5);
        assert_eq!(est.len(), 200);
        assert!(est[0] > 0.0);
        assert!((est[199] - 32.0).abs() < 0.1);
        assert!(pwm_estimate(&[false; 10], 5).iter().all(|&e| e == 0.0));
    }

    proptest! {
        #[test]
        fn partition_identity(x in any::<u16>(), w in any::<u16>()) {
            let (xv, wv) = (
                BitVector::from_u64(u64::from(x), 16).unwrap(),
                BitVector::from_u64(u64::from(w), 16).unwrap(),
            );
            let total = xv.and_count(&wv).unwrap() + xv.and_not_count(&wv).unwrap();
            prop_assert_eq!(total, x.count_ones() as usize);
        }

        #[test]
        fn zero_shift_is_no_decay(last_u in any::<i32>()) {
            let p = NeuronParams::new(0, 5).unwrap();
            prop_assert_eq!(p.decay(last_u), last_u);
        }

        // |psp| <= 8 and |decay(last_u)| <= 8, so u stays below 2 * threshold
        // and one subtraction always lands under the threshold
        #[test]
        fn reset_alone_never_refires(
            x in any::<u8>(),
            w in any::<u8>(),
            last_u in -8i32..=8,
            shift in 0u32..4,
            threshold in 9i32..32,
        ) {
            let p = NeuronParams::new(shift, threshold).unwrap();
            let out = neuron_step(&v8(u64::from(x)), &v8(u64::from(w)), last_u, p).unwrap();
            if out.spike {
                prop_assert!((0..threshold).contains(&out.u));
                let next = integrate(0, out.u, p);
                prop_assert!(!next.spike);
                prop_assert!(next.u < threshold);
            }
        }
    }
}
