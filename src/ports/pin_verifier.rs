use crate::error::YkagentResult;
use crate::model::Pin;

pub trait PinVerifier {
    /// Fails with `DeviceError::PinRejected` carrying the remaining attempts
    fn verify_pin(&mut self, pin: &Pin) -> YkagentResult<()>;

    fn pin_retries(&mut self) -> YkagentResult<u8>;
}
