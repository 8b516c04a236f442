use crate::error::YkagentResult;
use crate::model::{PublicKey, Slot};

pub trait KeyReader {
    /// Public key of the certificate stored in `slot`, `None` if the slot is empty
    fn read_public_key(&mut self, slot: Slot) -> YkagentResult<Option<PublicKey>>;
}
