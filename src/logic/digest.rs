//! Host-side hashing and padding done before a PIV sign call
//!
//! The card signs a precomputed digest (ECDSA) or a fully padded block
//! (RSA), so the SSH signature algorithm decides what is sent.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{KeyError, YkagentResult};
use crate::model::SignatureAlgorithm;

// DER prefixes of DigestInfo for each hash (RFC 8017 §9.2 note 1)
const SHA1_PREFIX: &[u8] = &[
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];
const SHA256_PREFIX: &[u8] = &[
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];
const SHA512_PREFIX: &[u8] = &[
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
    0x05, 0x00, 0x04, 0x40,
];

/// Bytes to hand to the card for `algorithm`.
///
/// `modulus_len` is only consulted for RSA and is the key size in bytes.
pub fn signing_input(
    algorithm: SignatureAlgorithm,
    data: &[u8],
    modulus_len: usize,
) -> YkagentResult<Vec<u8>> {
    match algorithm {
        SignatureAlgorithm::SshEd25519 => Ok(data.to_vec()),
        SignatureAlgorithm::EcdsaSha2Nistp256 => Ok(Sha256::digest(data).to_vec()),
        SignatureAlgorithm::EcdsaSha2Nistp384 => Ok(Sha384::digest(data).to_vec()),
        SignatureAlgorithm::SshRsa => {
            pkcs1_v15_pad(SHA1_PREFIX, &Sha1::digest(data), modulus_len)
        }
        SignatureAlgorithm::RsaSha2_256 => {
            pkcs1_v15_pad(SHA256_PREFIX, &Sha256::digest(data), modulus_len)
        }
        SignatureAlgorithm::RsaSha2_512 => {
            pkcs1_v15_pad(SHA512_PREFIX, &Sha512::digest(data), modulus_len)
        }
    }
}

/// EMSA-PKCS1-v1_5 encoding: `00 01 FF..FF 00 || DigestInfo`
fn pkcs1_v15_pad(prefix: &[u8], hash: &[u8], modulus_len: usize) -> YkagentResult<Vec<u8>> {
    let t_len = prefix.len() + hash.len();
    if modulus_len < t_len + 11 {
        return Err(KeyError::InvalidEncoding {
            reason: format!("RSA modulus of {modulus_len} bytes too short for digest"),
        }
        .into());
    }
    let mut block = Vec::with_capacity(modulus_len);
    block.push(0x00);
    block.push(0x01);
    block.resize(modulus_len - t_len - 1, 0xff);
    block.push(0x00);
    block.extend_from_slice(prefix);
    block.extend_from_slice(hash);
    Ok(block)
}
