//! Signer trait - capability to sign data

use crate::error::YkagentResult;
use crate::model::{PublicKey, Signature, SignatureAlgorithm, Slot};

/// Result of a single sign attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(Signature),
    /// The key's PIN policy demands a PIN that is not cached
    PinRequired,
}

/// Capability to sign data
///
/// This trait abstracts signing operations using keys stored on YubiKey.
pub trait Signer {
    /// Sign data using the key in the specified slot
    ///
    /// # Arguments
    ///
    /// * `slot` - The slot containing the key to use
    /// * `key` - Public half of that key, used to size RSA padding
    /// * `algorithm` - SSH signature algorithm to produce
    /// * `data` - The data to sign
    ///
    /// # Returns
    ///
    /// The signature, or `SignOutcome::PinRequired` when the card refused
    /// for lack of PIN verification
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The key was not touched in time (`DeviceError::Timeout`)
    /// - The algorithm does not fit the key
    /// - The card fails the operation
    ///
    /// Blocks until the card answers, which includes the touch window.
    fn sign(
        &mut self,
        slot: Slot,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        data: &[u8],
    ) -> YkagentResult<SignOutcome>;
}
