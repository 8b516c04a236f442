//! PIV implementation of the device ports
//!
//! Talks to a YubiKey through PC/SC using the yubikey crate. Public keys are
//! taken from the X.509 certificate stored next to each slot's private key.

use std::time::{Duration, Instant};

use der::asn1::ObjectIdentifier;
use tracing::{debug, info};
use yubikey::piv::{sign_data, SlotId};
use yubikey::{Certificate, Context, YubiKey};

use crate::error::{DeviceError, KeyError, YkagentResult};
use crate::logic::signing_input;
use crate::logic::ssh_encoding::{
    ecdsa_der_to_ssh, encode_ecdsa_key, encode_ed25519_key, encode_rsa_key,
};
use crate::model::{KeyAlgorithm, Pin, PublicKey, Signature, SignatureAlgorithm, Slot};
use crate::ports::{DeviceConnection, DeviceFinder, KeyReader, PinVerifier, SignOutcome, Signer};

const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const P256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const P384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// The card gives up waiting for a touch after roughly 15 seconds. A failed
/// sign that took at least this long is treated as a touch timeout.
const TOUCH_WINDOW: Duration = Duration::from_secs(14);

/// PC/SC device finder
#[derive(Debug, Clone, Default)]
pub struct PivDeviceFinder;

impl DeviceFinder for PivDeviceFinder {
    type Device = PivYubiKey;

    fn enumerate(&self) -> YkagentResult<Vec<String>> {
        let mut context = Context::open().map_err(|e| DeviceError::Unavailable {
            reason: format!("could not open PC/SC context: {e}"),
        })?;
        let readers = context.iter().map_err(|e| DeviceError::Unavailable {
            reason: format!("could not list readers: {e}"),
        })?;
        Ok(readers.map(|reader| reader.name().into_owned()).collect())
    }

    fn open(&self, reader: &str) -> YkagentResult<Self::Device> {
        let mut context = Context::open().map_err(|e| DeviceError::Unavailable {
            reason: format!("could not open PC/SC context: {e}"),
        })?;
        let readers = context.iter().map_err(|e| DeviceError::Unavailable {
            reason: format!("could not list readers: {e}"),
        })?;
        for candidate in readers {
            if candidate.name() == reader {
                let device = candidate.open()?;
                debug!(reader, "Opened YubiKey");
                return Ok(PivYubiKey::new(device));
            }
        }
        Err(DeviceError::Unavailable {
            reason: format!("reader {reader} disappeared"),
        }
        .into())
    }
}

/// Open handle to one YubiKey
pub struct PivYubiKey {
    device: YubiKey,
    /// Key read by the last `read_public_key`, reused when signing
    resolved: Option<(Slot, PublicKey)>,
}

impl PivYubiKey {
    pub fn new(device: YubiKey) -> Self {
        Self {
            device,
            resolved: None,
        }
    }

    fn stored_key(&mut self, slot: Slot) -> YkagentResult<PublicKey> {
        if let Some((cached_slot, key)) = &self.resolved {
            if *cached_slot == slot {
                return Ok(key.clone());
            }
        }
        self.read_public_key(slot)?.ok_or_else(|| {
            KeyError::Unavailable {
                slot: slot.to_string(),
            }
            .into()
        })
    }
}

impl DeviceConnection for PivYubiKey {
    fn serial(&mut self) -> YkagentResult<u32> {
        Ok(self.device.serial().into())
    }

    fn firmware_major(&mut self) -> u8 {
        self.device.version().major
    }

    // Reading the attestation certificate needs no PIN. The serial is not
    // used because some firmware drops the PIN cache when it is read.
    fn is_healthy(&mut self) -> bool {
        match Certificate::read(&mut self.device, SlotId::Attestation) {
            Ok(_) => true,
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    fn disconnect(self) -> YkagentResult<()> {
        drop(self.device);
        Ok(())
    }
}

impl PinVerifier for PivYubiKey {
    fn verify_pin(&mut self, pin: &Pin) -> YkagentResult<()> {
        self.device.verify_pin(pin.as_bytes())?;
        debug!("PIN verified");
        Ok(())
    }

    fn pin_retries(&mut self) -> YkagentResult<u8> {
        Ok(self.device.get_pin_retries()?)
    }
}

impl KeyReader for PivYubiKey {
    fn read_public_key(&mut self, slot: Slot) -> YkagentResult<Option<PublicKey>> {
        let read = Certificate::read(&mut self.device, slot.to_yubikey_slot_id());
        let Some(certificate) = stored_certificate(read)? else {
            self.resolved = None;
            return Ok(None);
        };
        let spki = &certificate.cert.tbs_certificate.subject_public_key_info;
        let parameters = spki.algorithm.parameters.as_ref().map(|p| p.value());
        let key = decode_public_key(
            spki.algorithm.oid,
            parameters,
            spki.subject_public_key.raw_bytes(),
        )?;
        self.resolved = Some((slot, key.clone()));
        Ok(Some(key))
    }
}

impl Signer for PivYubiKey {
    fn sign(
        &mut self,
        slot: Slot,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        data: &[u8],
    ) -> YkagentResult<SignOutcome> {
        let stored = self.stored_key(slot)?;
        if !stored.matches(key.blob()) {
            return Err(KeyError::NoMatchingKey.into());
        }
        let key_algorithm = stored.algorithm();
        let algorithm_id =
            key_algorithm
                .to_yubikey_algorithm_id()
                .ok_or_else(|| KeyError::UnsupportedKeyType {
                    algorithm: key_algorithm.to_string(),
                })?;

        let input = signing_input(algorithm, data, modulus_len(key_algorithm))?;
        debug!(slot = %slot, algorithm = %algorithm, "Sending sign request to YubiKey");

        let started = Instant::now();
        let raw = match sign_data(&mut self.device, &input, algorithm_id, slot.to_yubikey_slot_id())
        {
            Ok(raw) => raw,
            Err(e) => return classify_sign_error(e, started.elapsed()),
        };
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "YubiKey signed");

        let blob = match key_algorithm {
            KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => ecdsa_der_to_ssh(&raw)?,
            _ => raw.to_vec(),
        };
        Ok(SignOutcome::Signed(Signature { algorithm, blob }))
    }
}

/// An empty slot reads back as `InvalidObject`: the crate turns a failed
/// object fetch into an empty buffer and then fails to parse it.
fn stored_certificate(
    read: Result<Certificate, yubikey::Error>,
) -> YkagentResult<Option<Certificate>> {
    match read {
        Ok(certificate) => Ok(Some(certificate)),
        Err(yubikey::Error::InvalidObject | yubikey::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// SSH public key blob for a certificate's `SubjectPublicKeyInfo`
fn decode_public_key(
    oid: ObjectIdentifier,
    parameters: Option<&[u8]>,
    key_bytes: &[u8],
) -> YkagentResult<PublicKey> {
    if oid == ED25519_OID {
        return encode_ed25519_key(key_bytes);
    }
    if oid == RSA_ENCRYPTION_OID {
        return encode_rsa_key(key_bytes);
    }
    if oid == EC_PUBLIC_KEY_OID {
        let curve = parameters
            .map(ObjectIdentifier::from_bytes)
            .transpose()
            .map_err(|e| KeyError::InvalidEncoding {
                reason: format!("bad curve identifier: {e}"),
            })?;
        return match curve {
            Some(curve) if curve == P256_OID => encode_ecdsa_key(KeyAlgorithm::EcdsaP256, key_bytes),
            Some(curve) if curve == P384_OID => encode_ecdsa_key(KeyAlgorithm::EcdsaP384, key_bytes),
            Some(curve) => Err(KeyError::UnsupportedKeyType {
                algorithm: format!("EC curve {curve}"),
            }
            .into()),
            None => Err(KeyError::InvalidEncoding {
                reason: "EC key without curve".to_string(),
            }
            .into()),
        };
    }
    Err(KeyError::UnsupportedKeyType {
        algorithm: oid.to_string(),
    }
    .into())
}

fn modulus_len(algorithm: KeyAlgorithm) -> usize {
    match algorithm {
        KeyAlgorithm::Rsa1024 => 128,
        KeyAlgorithm::Rsa2048 => 256,
        _ => 0,
    }
}

/// Map a failed `sign_data` onto the port's outcomes
fn classify_sign_error(err: yubikey::Error, elapsed: Duration) -> YkagentResult<SignOutcome> {
    match err {
        yubikey::Error::AuthenticationError if elapsed < TOUCH_WINDOW => {
            Ok(SignOutcome::PinRequired)
        }
        _ if elapsed >= TOUCH_WINDOW => {
            debug!("Sign failed after {:?}: {}", elapsed, err);
            Err(DeviceError::Timeout.into())
        }
        other => Err(other.into()),
    }
}
