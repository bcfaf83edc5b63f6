#![doc = include_str!("../README.md")]

mod threshold;

#[doc(inline)]
pub use threshold::{Edge, SweepPoint, ThresholdGraph};
