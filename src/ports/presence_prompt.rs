//! PresencePrompt trait - PIN and touch dialogs shown to the user

use crate::error::YkagentResult;
use crate::model::{Pin, PinRequest, TouchOutcome, TouchRequest};

pub trait PresencePrompt: Send + Sync {
    /// Ask for the PIN; `Ok(None)` means the user cancelled
    fn request_pin(&self, request: &PinRequest) -> YkagentResult<Option<Pin>>;

    /// Tell the user to touch the key
    ///
    /// Must return within a bounded time. The card enforces the real touch
    /// timeout, not this dialog.
    fn request_touch(&self, request: &TouchRequest) -> YkagentResult<TouchOutcome>;

    /// Fire-and-forget message, used when the touch dialog fails
    fn notify(&self, message: &str);
}
