//! SSH wire encoding (RFC 4251 §5) for keys, signatures and agent messages

use der::asn1::UintRef;
use der::{Decode, Sequence};

use crate::error::{AgentError, KeyError, YkagentResult};
use crate::model::{KeyAlgorithm, PublicKey, Signature};

/// Appends SSH wire types to a buffer
#[derive(Debug, Default, Clone)]
pub struct SshWriter {
    buf: Vec<u8>,
}

impl SshWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_string(&mut self, value: &[u8]) -> &mut Self {
        self.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value);
        self
    }

    /// Unsigned big-endian integer as an SSH mpint
    pub fn put_mpint(&mut self, magnitude: &[u8]) -> &mut Self {
        let start = magnitude
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(magnitude.len());
        let trimmed = &magnitude[start..];
        let pad = trimmed.first().is_some_and(|b| b & 0x80 != 0);
        self.put_u32((trimmed.len() + usize::from(pad)) as u32);
        if pad {
            self.buf.push(0);
        }
        self.buf.extend_from_slice(trimmed);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads SSH wire types from a message body
#[derive(Debug)]
pub struct SshReader<'a> {
    data: &'a [u8],
}

impl<'a> SshReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, len: usize) -> YkagentResult<&'a [u8]> {
        if self.data.len() < len {
            return Err(AgentError::Protocol {
                reason: format!("truncated message: need {len} bytes, have {}", self.data.len()),
            }
            .into());
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub fn u8(&mut self) -> YkagentResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> YkagentResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn string(&mut self) -> YkagentResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Trailing optional u32; absent means zero
    pub fn optional_u32(&mut self) -> YkagentResult<u32> {
        if self.data.is_empty() {
            Ok(0)
        } else {
            self.u32()
        }
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }
}

/// Ed25519 public key as an SSH blob
pub fn encode_ed25519_key(point: &[u8]) -> YkagentResult<PublicKey> {
    if point.len() != 32 {
        return Err(KeyError::InvalidEncoding {
            reason: format!("Ed25519 public key must be 32 bytes, got {}", point.len()),
        }
        .into());
    }
    let mut w = SshWriter::new();
    w.put_string(KeyAlgorithm::Ed25519.ssh_name().as_bytes())
        .put_string(point);
    Ok(PublicKey::new(KeyAlgorithm::Ed25519, w.into_bytes()))
}

/// ECDSA public key (uncompressed SEC1 point) as an SSH blob
pub fn encode_ecdsa_key(algorithm: KeyAlgorithm, point: &[u8]) -> YkagentResult<PublicKey> {
    let (curve, coordinate_len) = match algorithm {
        KeyAlgorithm::EcdsaP256 => ("nistp256", 32),
        KeyAlgorithm::EcdsaP384 => ("nistp384", 48),
        other => {
            return Err(KeyError::UnsupportedKeyType {
                algorithm: other.to_string(),
            }
            .into())
        }
    };
    if point.len() != 1 + 2 * coordinate_len || point[0] != 0x04 {
        return Err(KeyError::InvalidEncoding {
            reason: format!("expected uncompressed {curve} point"),
        }
        .into());
    }
    let mut w = SshWriter::new();
    w.put_string(algorithm.ssh_name().as_bytes())
        .put_string(curve.as_bytes())
        .put_string(point);
    Ok(PublicKey::new(algorithm, w.into_bytes()))
}

#[derive(Sequence)]
struct RsaPublicKeyDer<'a> {
    modulus: UintRef<'a>,
    public_exponent: UintRef<'a>,
}

/// PKCS#1 `RSAPublicKey` as an SSH blob
pub fn encode_rsa_key(pkcs1_der: &[u8]) -> YkagentResult<PublicKey> {
    let key = RsaPublicKeyDer::from_der(pkcs1_der)?;
    let modulus = key.modulus.as_bytes();
    let algorithm = match modulus.len() * 8 {
        1024 => KeyAlgorithm::Rsa1024,
        2048 => KeyAlgorithm::Rsa2048,
        bits => {
            return Err(KeyError::UnsupportedKeyType {
                algorithm: format!("RSA-{bits}"),
            }
            .into())
        }
    };
    let mut w = SshWriter::new();
    w.put_string(algorithm.ssh_name().as_bytes())
        .put_mpint(key.public_exponent.as_bytes())
        .put_mpint(modulus);
    Ok(PublicKey::new(algorithm, w.into_bytes()))
}

#[derive(Sequence)]
struct EcdsaSigValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// Re-encode a DER `Ecdsa-Sig-Value` as the SSH `mpint r, mpint s` pair
pub fn ecdsa_der_to_ssh(der_signature: &[u8]) -> YkagentResult<Vec<u8>> {
    let sig = EcdsaSigValue::from_der(der_signature)?;
    let mut w = SshWriter::new();
    w.put_mpint(sig.r.as_bytes()).put_mpint(sig.s.as_bytes());
    Ok(w.into_bytes())
}

/// Full SSH signature encoding: `string format, string blob`
pub fn encode_signature(signature: &Signature) -> Vec<u8> {
    let mut w = SshWriter::new();
    w.put_string(signature.algorithm.as_str().as_bytes())
        .put_string(&signature.blob);
    w.into_bytes()
}
