//! Domain types for the agent
//!
//! These wrap primitives so that invariants (PIN length, slot ids,
//! algorithm choice) are enforced at construction.

mod algorithm;
mod key;
mod pin;
mod policy;
mod presence;
mod slot;

pub use algorithm::{KeyAlgorithm, SignFlags, SignatureAlgorithm};
pub use key::{DeviceIdentity, Identity, KeyHandle, PublicKey, Signature};
pub use pin::{Pin, PinError};
pub use policy::ReleasePolicy;
pub use presence::{PinRequest, TouchOutcome, TouchRequest};
pub use slot::{Slot, SlotError};
