//! Key and signature algorithms understood by the agent

use std::fmt;

/// Type of the key held in a PIV slot
///
/// This type provides a type-safe way to describe the device key and
/// carries its SSH public key format name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// Ed25519 (EdDSA with Curve25519)
    Ed25519,
    /// ECDSA P-256
    EcdsaP256,
    /// ECDSA P-384
    EcdsaP384,
    /// RSA 1024-bit
    Rsa1024,
    /// RSA 2048-bit
    Rsa2048,
}

impl KeyAlgorithm {
    /// SSH public key format name
    pub fn ssh_name(self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ssh-ed25519",
            KeyAlgorithm::EcdsaP256 => "ecdsa-sha2-nistp256",
            KeyAlgorithm::EcdsaP384 => "ecdsa-sha2-nistp384",
            KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048 => "ssh-rsa",
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(self, KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048)
    }

    /// Signature algorithm used when the client expresses no preference
    pub fn default_signature(self) -> SignatureAlgorithm {
        match self {
            KeyAlgorithm::Ed25519 => SignatureAlgorithm::SshEd25519,
            KeyAlgorithm::EcdsaP256 => SignatureAlgorithm::EcdsaSha2Nistp256,
            KeyAlgorithm::EcdsaP384 => SignatureAlgorithm::EcdsaSha2Nistp384,
            KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048 => SignatureAlgorithm::SshRsa,
        }
    }

    /// Pick the signature algorithm for a sign request.
    ///
    /// Flags only apply to RSA keys; SHA-256 wins when both are set.
    pub fn signature_for(self, flags: SignFlags) -> SignatureAlgorithm {
        if self.is_rsa() {
            if flags.contains(SignFlags::RSA_SHA2_256) {
                return SignatureAlgorithm::RsaSha2_256;
            }
            if flags.contains(SignFlags::RSA_SHA2_512) {
                return SignatureAlgorithm::RsaSha2_512;
            }
        }
        self.default_signature()
    }

    /// Convert to yubikey crate's AlgorithmId
    ///
    /// Ed25519 has no PIV algorithm identifier in the yubikey crate release
    /// we build against, so it yields `None`.
    pub fn to_yubikey_algorithm_id(self) -> Option<yubikey::piv::AlgorithmId> {
        match self {
            KeyAlgorithm::Ed25519 => None,
            KeyAlgorithm::EcdsaP256 => Some(yubikey::piv::AlgorithmId::EccP256),
            KeyAlgorithm::EcdsaP384 => Some(yubikey::piv::AlgorithmId::EccP384),
            KeyAlgorithm::Rsa1024 => Some(yubikey::piv::AlgorithmId::Rsa1024),
            KeyAlgorithm::Rsa2048 => Some(yubikey::piv::AlgorithmId::Rsa2048),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ssh_name())
    }
}

/// SSH signature algorithm identifier handed to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    SshEd25519,
    EcdsaSha2Nistp256,
    EcdsaSha2Nistp384,
    /// RSA PKCS#1 v1.5 with SHA-1
    SshRsa,
    RsaSha2_256,
    RsaSha2_512,
}

impl SignatureAlgorithm {
    /// Name used in the SSH signature blob
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::SshEd25519 => "ssh-ed25519",
            SignatureAlgorithm::EcdsaSha2Nistp256 => "ecdsa-sha2-nistp256",
            SignatureAlgorithm::EcdsaSha2Nistp384 => "ecdsa-sha2-nistp384",
            SignatureAlgorithm::SshRsa => "ssh-rsa",
            SignatureAlgorithm::RsaSha2_256 => "rsa-sha2-256",
            SignatureAlgorithm::RsaSha2_512 => "rsa-sha2-512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags field of an agent sign request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignFlags(u32);

impl SignFlags {
    pub const NONE: SignFlags = SignFlags(0);
    pub const RSA_SHA2_256: SignFlags = SignFlags(0x02);
    pub const RSA_SHA2_512: SignFlags = SignFlags(0x04);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SignFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for SignFlags {
    type Output = SignFlags;

    fn bitor(self, rhs: SignFlags) -> SignFlags {
        SignFlags(self.0 | rhs.0)
    }
}
