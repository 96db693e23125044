//! Clocked device abstraction
//!
//! The chip is a black box that accepts one bus word per clock edge and
//! exposes one output word per edge. Whatever owns the clock (a simulator
//! bridge, an FPGA harness, or [`SoftwareDevice`](crate::SoftwareDevice))
//! implements this trait; the protocol driver only ever talks to it through
//! these four calls.

use std::fmt::Debug;

/// Device driven by the bit-serial bus, one edge at a time.
pub trait ClockedDevice: Debug {
    /// Present `word` on the input bus for the next edge.
    fn drive(&mut self, word: u64);

    /// Advance one rising clock edge.
    fn clock_edge(&mut self);

    /// Output bus after the last edge, or `None` if it is unresolved
    /// (undriven / X in simulation).
    fn output(&self) -> Option<u64>;

    /// Whether the device has left reset and accepts commands.
    fn is_ready(&self) -> bool;

    /// Device kind, for logs.
    fn device_kind(&self) -> DeviceKind;
}

/// Device kind identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// In-process emulation of the die (bit-exact reference arithmetic)
    Software,

    /// Anything outside this crate: RTL simulation, FPGA, silicon
    External,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software => write!(f, "Software"),
            Self::External => write!(f, "External"),
        }
    }
}

impl<D: ClockedDevice + ?Sized> ClockedDevice for &mut D {
    fn drive(&mut self, word: u64) {
        (**self).drive(word);
    }

    fn clock_edge(&mut self) {
        (**self).clock_edge();
    }

    fn output(&self) -> Option<u64> {
        (**self).output()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn device_kind(&self) -> DeviceKind {
        (**self).device_kind()
    }
}

impl<D: ClockedDevice + ?Sized> ClockedDevice for Box<D> {
    fn drive(&mut self, word: u64) {
        (**self).drive(word);
    }

    fn clock_edge(&mut self) {
        (**self).clock_edge();
    }

    fn output(&self) -> Option<u64> {
        (**self).output()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn device_kind(&self) -> DeviceKind {
        (**self).device_kind()
    }
}
