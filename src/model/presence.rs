//! Requests handed to the presence prompt service

use std::path::PathBuf;

use super::DeviceIdentity;

/// Parameters of a PIN dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRequest {
    pub identity: DeviceIdentity,
    pub retries_remaining: u8,
    pub icon: Option<PathBuf>,
}

/// Parameters of a touch dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchRequest {
    pub identity: DeviceIdentity,
    pub icon: Option<PathBuf>,
}

/// How a touch dialog ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    Confirmed,
    TimedOut,
}
