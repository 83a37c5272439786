// src/config/constants.rs
//! System-wide configuration constants

/// Firmware clock constants
pub mod clock {
    /// Base sampling clock of current hardware revisions.
    pub const BASE_CLOCK_HZ: f64 = 32768.0;

    /// Base sampling clock of the legacy hardware revision.
    pub const LEGACY_BASE_CLOCK_HZ: f64 = 1024.0;

    /// Default sampling rate requested when no configuration is supplied.
    pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 51.2;
}

/// Settle-delay constants for native configuration writes.
///
/// The firmware requires strict spacing between sequential configuration
/// writes; these are empirical values, exposed through `SettleDelays` so
/// slower hardware revisions can widen them.
pub mod settle {
    pub const AFTER_STOP_MS: u64 = 100;
    pub const AFTER_RATE_WRITE_MS: u64 = 200;
    pub const AFTER_BITMASK_WRITE_MS: u64 = 250;
    pub const AFTER_METADATA_REFRESH_MS: u64 = 350;
    pub const AFTER_CALIBRATION_MS: u64 = 150;
}

/// Relay acknowledgment timing constants
pub mod relay {
    pub const HELLO_ACK_TIMEOUT_MS: u64 = 3000;
    pub const OPEN_RETRY_ATTEMPTS: u32 = 8;
    pub const OPEN_RETRY_SPACING_MS: u64 = 600;
    pub const START_ACK_TIMEOUT_MS: u64 = 12000;
    pub const RATE_ACK_TIMEOUT_MS: u64 = 6000;
    pub const CONFIG_ACK_TIMEOUT_MS: u64 = 6000;

    /// Capacity of the raw-event channel between a transport and the session
    /// receive loop.
    pub const FRAME_CHANNEL_DEPTH: usize = 256;
}

/// Subscriber fan-out constants
pub mod delivery {
    /// Default per-subscriber queue depth; publishing never blocks, events
    /// beyond this depth are dropped for that subscriber.
    pub const DEFAULT_SUBSCRIBER_QUEUE_DEPTH: usize = 128;
}

/// Candidate signal names, ordered by preference.
///
/// Firmware and driver generations expose the same logical channel under
/// different names; resolution walks each list in order (see
/// `acquisition::resolver`). The EXG lists are the long ones: the bioelectric
/// front end has been renamed across three firmware families.
pub mod names {
    pub const TIMESTAMP: &[&str] = &["Timestamp", "TIMESTAMP", "System Timestamp"];

    pub const ACCEL_LN_X: &[&str] = &["Low Noise Accelerometer X", "Accel LN X", "ACCEL_LN_X"];
    pub const ACCEL_LN_Y: &[&str] = &["Low Noise Accelerometer Y", "Accel LN Y", "ACCEL_LN_Y"];
    pub const ACCEL_LN_Z: &[&str] = &["Low Noise Accelerometer Z", "Accel LN Z", "ACCEL_LN_Z"];

    pub const ACCEL_WR_X: &[&str] = &["Wide Range Accelerometer X", "Accel WR X", "ACCEL_WR_X"];
    pub const ACCEL_WR_Y: &[&str] = &["Wide Range Accelerometer Y", "Accel WR Y", "ACCEL_WR_Y"];
    pub const ACCEL_WR_Z: &[&str] = &["Wide Range Accelerometer Z", "Accel WR Z", "ACCEL_WR_Z"];

    pub const GYRO_X: &[&str] = &["Gyroscope X", "GyroscopeX", "GYRO_X"];
    pub const GYRO_Y: &[&str] = &["Gyroscope Y", "GyroscopeY", "GYRO_Y"];
    pub const GYRO_Z: &[&str] = &["Gyroscope Z", "GyroscopeZ", "GYRO_Z"];

    pub const MAG_X: &[&str] = &["Magnetometer X", "MagnetometerX", "MAG_X"];
    pub const MAG_Y: &[&str] = &["Magnetometer Y", "MagnetometerY", "MAG_Y"];
    pub const MAG_Z: &[&str] = &["Magnetometer Z", "MagnetometerZ", "MAG_Z"];

    pub const PRESSURE: &[&str] = &["Pressure", "BMP Pressure", "PRESSURE"];
    pub const TEMPERATURE: &[&str] = &["Temperature", "BMP Temperature", "TEMPERATURE"];
    pub const BATTERY: &[&str] = &["VSenseBatt", "Battery", "BATTERY"];

    pub const EXT_A6: &[&str] = &["External ADC A6", "Ext A6", "EXT_EXP_A6"];
    pub const EXT_A7: &[&str] = &["External ADC A7", "Ext A7", "EXT_EXP_A7"];
    pub const EXT_A15: &[&str] = &["External ADC A15", "Ext A15", "EXT_EXP_A15"];

    pub const EXG1_CH1: &[&str] = &["EXG1_CH1", "EXG_CH1", "ECG_CH1", "EMG_CH1", "EXG1 CH1"];
    pub const EXG1_CH2: &[&str] = &["EXG1_CH2", "EXG_CH2", "ECG_CH2", "EMG_CH2", "EXG1 CH2"];
    pub const EXG2_CH1: &[&str] = &["EXG2_CH1", "ECG_VX_RL", "EXG2 CH1"];
    pub const EXG2_CH2: &[&str] = &["EXG2_CH2", "ECG_VX_LL", "EXG2 CH2"];
}
