// src/acquisition/mod.rs
//! Sample acquisition pipeline: rate quantization, channel bitmasks, signal
//! index resolution and frame assembly

pub mod bitmask;
pub mod frame;
pub mod rate;
pub mod resolver;

pub use bitmask::{bitmask_for, SensorChannel};
pub use frame::{SampleFrame, SampleFrameBuilder};
pub use rate::{quantize, quantize_default};
pub use resolver::{candidate_names, resolve, ResolvedSignal, SignalIndexMap};
