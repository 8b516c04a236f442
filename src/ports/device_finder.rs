use super::PivDevice;
use crate::error::YkagentResult;

/// Capability to discover and open PIV devices
pub trait DeviceFinder {
    type Device: PivDevice;

    /// Names of the attached smart card readers, in PC/SC order
    fn enumerate(&self) -> YkagentResult<Vec<String>>;

    /// Open the device behind one reader
    fn open(&self, reader: &str) -> YkagentResult<Self::Device>;
}
