//! Connection lifecycle of the single device the agent talks to
//!
//! `DeviceSession` owns at most one open handle. Callers must hold the
//! coordinator's device lock around every method, so handle swaps and
//! device I/O never interleave.

use tracing::{debug, info, warn};

use crate::error::{DeviceError, YkagentError, YkagentResult};
use crate::model::{DeviceIdentity, ReleasePolicy};
use crate::ports::{DeviceConnection, DeviceFinder};

pub struct DeviceSession<F: DeviceFinder> {
    finder: F,
    device: Option<F::Device>,
    identity: Option<DeviceIdentity>,
    release_policy: ReleasePolicy,
    /// `release_policy` applied to the first device that connected
    release_after_use: Option<bool>,
}

impl<F: DeviceFinder> DeviceSession<F> {
    pub fn new(finder: F, release_policy: ReleasePolicy) -> Self {
        Self {
            finder,
            device: None,
            identity: None,
            release_policy,
            release_after_use: None,
        }
    }

    /// Make sure a healthy handle is open and return it with the identity
    /// cached when it was opened.
    ///
    /// A stale handle is closed and replaced. Readers that fail to open are
    /// skipped, since laptops often carry unrelated smart card readers.
    pub fn ensure(&mut self) -> YkagentResult<(DeviceIdentity, &mut F::Device)> {
        let healthy = match self.device.as_mut() {
            Some(device) => {
                let healthy = device.is_healthy();
                if !healthy {
                    debug!(error = %DeviceError::StaleSession, "health check failed");
                }
                healthy
            }
            None => false,
        };

        if !healthy {
            if let Some(stale) = self.device.take() {
                info!("Reconnecting to the YubiKey...");
                self.identity = None;
                if let Err(e) = stale.disconnect() {
                    warn!("Failed to close stale YubiKey handle: {}", e);
                }
            } else {
                info!("Connecting to the YubiKey...");
            }
            self.connect()?;
        }

        match (self.identity, self.device.as_mut()) {
            (Some(identity), Some(device)) => Ok((identity, device)),
            _ => Err(DeviceError::SessionClosed.into()),
        }
    }

    fn connect(&mut self) -> YkagentResult<()> {
        let readers = self.finder.enumerate().map_err(unavailable)?;
        if readers.is_empty() {
            return Err(DeviceError::Unavailable {
                reason: "no YubiKey detected".to_string(),
            }
            .into());
        }

        let mut last_error = None;
        for reader in &readers {
            match self.finder.open(reader) {
                Ok(mut device) => {
                    // Read once: asking again later can drop the PIN cache
                    let serial = device.serial().unwrap_or_else(|e| {
                        warn!("Failed to read YubiKey serial: {}", e);
                        0
                    });
                    if self.release_after_use.is_none() {
                        let firmware_major = device.firmware_major();
                        let release = self.release_policy.resolve(firmware_major);
                        debug!(
                            firmware_major,
                            release_after_use = release,
                            "Resolved release policy"
                        );
                        self.release_after_use = Some(release);
                    }
                    let identity = DeviceIdentity::new(serial);
                    info!(serial, reader = %reader, "Connected to YubiKey");
                    self.identity = Some(identity);
                    self.device = Some(device);
                    return Ok(());
                }
                Err(e) => {
                    debug!(reader = %reader, "Skipping reader: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(DeviceError::Unavailable {
            reason: match last_error {
                Some(e) => format!("no reader could be opened: {e}"),
                None => "no YubiKey detected".to_string(),
            },
        }
        .into())
    }

    /// Run the read-only health query on the open handle, if any
    pub fn health_check(&mut self) -> bool {
        self.device
            .as_mut()
            .is_some_and(|device| device.is_healthy())
    }

    /// Drop the handle after an operation when the release policy says so
    pub fn release(&mut self) {
        if !self.release_after_use.unwrap_or(false) {
            return;
        }
        if let Some(device) = self.device.take() {
            self.identity = None;
            match device.disconnect() {
                Ok(()) => debug!("Released YubiKey"),
                Err(e) => warn!("Failed to automatically release YubiKey lock: {}", e),
            }
        }
    }

    /// Unconditionally drop the handle and the cached identity
    pub fn close(&mut self) -> YkagentResult<()> {
        self.identity = None;
        match self.device.take() {
            Some(device) => {
                info!("Dropping YubiKey transaction...");
                device.disconnect()
            }
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Identity cached at the last successful connect
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }
}

fn unavailable(err: YkagentError) -> YkagentError {
    match err {
        YkagentError::Device(DeviceError::Unavailable { .. }) => err,
        other => DeviceError::Unavailable {
            reason: other.to_string(),
        }
        .into(),
    }
}
