//! Device backends
//!
//! Only the software die lives in this crate. Simulator bridges and board
//! harnesses implement [`ClockedDevice`](crate::ClockedDevice) outside it.

pub mod software;

pub use software::SoftwareDevice;
