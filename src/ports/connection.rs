//! DeviceConnection trait - lifecycle of an open device handle

use crate::error::YkagentResult;

pub trait DeviceConnection {
    /// Serial number of the device
    fn serial(&mut self) -> YkagentResult<u32>;

    /// Major firmware version, as reported when the handle was opened
    fn firmware_major(&mut self) -> u8;

    /// Read-only query that needs no PIN
    ///
    /// Must not touch the serial number or the PIN retry counter: on older
    /// firmware the former drops the PIN cache and the latter fails once the
    /// session is unlocked.
    fn is_healthy(&mut self) -> bool;

    /// Release the connection
    fn disconnect(self) -> YkagentResult<()>
    where
        Self: Sized;
}
