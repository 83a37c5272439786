//! BioSense-Core: session and acquisition library for wearable sensor units
//!
//! This library drives sessions with multi-channel wearable sensor devices
//! (IMU plus bioelectric front end) over three transports: native serial,
//! native Bluetooth, and a JSON line-protocol network relay. It provides:
//!
//! - A single session state machine over a transport abstraction layer
//! - Firmware-exact sampling-rate quantization against the device base clock
//! - Name-based signal index resolution with calibrated-format priority
//! - Per-subscriber lossy frame delivery that never stalls acquisition
//! - TOML configuration loading with validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use biosense_core::config::{SensorConfiguration, SessionConfig, TargetAddress};
//! use biosense_core::session::{DeviceSession, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let target = TargetAddress::Relay {
//!         host: "127.0.0.1".to_string(),
//!         port: 9801,
//!         device: "unit-07".to_string(),
//!     };
//!     let mut session = DeviceSession::new(SessionConfig::new(target))?;
//!
//!     session.configure(SensorConfiguration::default()).await?;
//!     session.connect().await?;
//!     let mut frames = session.subscribe();
//!     session.start_streaming().await?;
//!
//!     while let Some(event) = frames.recv().await {
//!         match event {
//!             SessionEvent::Frame(frame) => println!("t={} {:?}", frame.timestamp, frame.gyro_x),
//!             SessionEvent::SessionLost { reason } => {
//!                 eprintln!("session lost: {reason}");
//!                 break;
//!             }
//!         }
//!     }
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod relay;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{quantize, SampleFrame, SignalIndexMap};
pub use config::{SensorConfiguration, SessionConfig, TargetAddress};
pub use error::{SessionError, SessionResult};
pub use hal::{Backend, SessionState, SignalFormat, TransportCaps};
pub use session::{DeviceSession, SessionEvent, SubscriptionHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Session and acquisition library for wearable sensor units".to_string(),
        backends: vec![
            "native serial".to_string(),
            "native bluetooth".to_string(),
            "network relay".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// Supported transport backends
    pub backends: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert_eq!(info.backends.len(), 3);
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
