//! Silicon model for the LIF spiking-neuron accelerator die.
//!
//! This crate has **no runtime dependencies** and **no device access**. It is
//! a pure model of the silicon: how the multiplexed bit-serial bus packs its
//! control and data fields on each die revision, what the mode codes are,
//! the clocking constants the bring-up scripts relied on, and the default
//! layer topology the connectivity masks are generated for.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`bus`] | Per-revision pin layout: `n_reset` flag, mode field, data field, word order |
//! | [`timing`] | Reset length, settle time, clock period, default capture length |
//! | [`topology`] | Default layer plan (16 → 16 → 16 → 8) and neuron reset parameters |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod timing;
pub mod topology;

pub use bus::{BusLayout, Mode, ModeCodes, OutputLayout, WordOrder};
