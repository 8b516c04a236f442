use std::fmt;

use super::{KeyAlgorithm, SignatureAlgorithm, Slot};

/// Serial number of the connected device, cached at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceIdentity {
    pub serial: u32,
}

impl DeviceIdentity {
    pub fn new(serial: u32) -> Self {
        Self { serial }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YubiKey #{}", self.serial)
    }
}

/// Public half of the key held in a slot, as an SSH public key blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    blob: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: KeyAlgorithm, blob: Vec<u8>) -> Self {
        Self { algorithm, blob }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// SSH wire encoding of the key
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Byte-exact comparison with a key blob sent by a client
    pub fn matches(&self, blob: &[u8]) -> bool {
        self.blob == blob
    }
}

/// A device key together with the slot it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    pub slot: Slot,
    pub public_key: PublicKey,
}

/// One entry of an identities answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key_blob: Vec<u8>,
    pub comment: String,
}

impl Identity {
    pub fn for_key(handle: &KeyHandle, device: DeviceIdentity) -> Self {
        Self {
            key_blob: handle.public_key.blob().to_vec(),
            comment: format!("{} PIV Slot {}", device, handle.slot),
        }
    }
}

/// Signature produced by the device, ready for an SSH sign response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: SignatureAlgorithm,
    /// Algorithm-specific signature bytes (raw Ed25519, mpint pair for ECDSA, RSA block)
    pub blob: Vec<u8>,
}
