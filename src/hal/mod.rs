// src/hal/mod.rs
//! Transport abstraction layer for wearable sensor units

pub mod bluetooth_driver;
pub mod serial_driver;
pub(crate) mod synth;
pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
