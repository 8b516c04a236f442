//! Instrumented in-memory PIV device for tests
//!
//! Every handle opened by `FakeDeviceFinder` shares one `FakeState`, so a
//! test can count opens, closes, PIN checks and sign calls across
//! reconnects, and detect device operations that overlap in time.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use ed25519_dalek::{Signer as _, SigningKey};

use crate::error::{DeviceError, KeyError, YkagentResult};
use crate::logic::ssh_encoding::encode_ed25519_key;
use crate::model::{Pin, PublicKey, Signature, SignatureAlgorithm, Slot};
use crate::ports::{DeviceConnection, DeviceFinder, KeyReader, PinVerifier, SignOutcome, Signer};

pub const FAKE_READER: &str = "Yubico YubiKey OTP+FIDO+CCID 00 00";
pub const FAKE_SERIAL: u32 = 12345678;
pub const FAKE_PIN: &str = "123456";
pub const FAKE_FIRMWARE_MAJOR: u8 = 5;
const PIN_ATTEMPTS: u8 = 3;

pub type SignHook = Arc<dyn Fn() + Send + Sync>;

/// Key held in the fake slot
#[derive(Clone)]
pub enum FakeKey {
    /// Real Ed25519 key, produces verifiable signatures
    Ed25519(SigningKey),
    /// Any other key type; "signs" by echoing the input
    Opaque(PublicKey),
}

impl FakeKey {
    pub fn public_key(&self) -> PublicKey {
        match self {
            FakeKey::Ed25519(key) => encode_ed25519_key(key.verifying_key().as_bytes())
                .expect("32-byte Ed25519 point"),
            FakeKey::Opaque(public_key) => public_key.clone(),
        }
    }
}

pub fn test_signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

#[derive(Clone)]
pub struct FakeReader {
    pub name: String,
    pub opens: bool,
}

/// Behaviour knobs, mutable between operations
pub struct FakeConfig {
    pub readers: Vec<FakeReader>,
    pub serial: u32,
    pub firmware_major: u8,
    pub key: Option<FakeKey>,
    pub pin: Pin,
    pub retries: u8,
    pub pin_required: bool,
    pub touch_times_out: bool,
    pub op_delay: Duration,
    pub sign_hook: Option<SignHook>,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            readers: vec![FakeReader {
                name: FAKE_READER.to_string(),
                opens: true,
            }],
            serial: FAKE_SERIAL,
            firmware_major: FAKE_FIRMWARE_MAJOR,
            key: Some(FakeKey::Ed25519(test_signing_key())),
            pin: Pin::from_str(FAKE_PIN).expect("valid test PIN"),
            retries: PIN_ATTEMPTS,
            pin_required: false,
            touch_times_out: false,
            op_delay: Duration::ZERO,
            sign_hook: None,
        }
    }
}

#[derive(Default)]
pub struct FakeCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub health_checks: AtomicUsize,
    pub serial_reads: AtomicUsize,
    pub key_reads: AtomicUsize,
    pub pin_verifications: AtomicUsize,
    pub sign_calls: AtomicUsize,
    /// Device operations that started while another was running
    pub overlaps: AtomicUsize,
}

pub struct FakeState {
    config: Mutex<FakeConfig>,
    pub counters: FakeCounters,
    healthy: AtomicBool,
    pin_cached: AtomicBool,
    in_flight: AtomicBool,
    last_algorithm: Mutex<Option<SignatureAlgorithm>>,
}

impl FakeState {
    pub fn new() -> Arc<Self> {
        Self::with_config(FakeConfig::default())
    }

    /// No readers attached at all
    pub fn without_devices() -> Arc<Self> {
        Self::with_config(FakeConfig {
            readers: Vec::new(),
            ..FakeConfig::default()
        })
    }

    pub fn with_config(config: FakeConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            counters: FakeCounters::default(),
            healthy: AtomicBool::new(true),
            pin_cached: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            last_algorithm: Mutex::new(None),
        })
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeConfig)) {
        f(&mut self.config());
    }

    fn config(&self) -> MutexGuard<'_, FakeConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn count(&self, counter: impl Fn(&FakeCounters) -> &AtomicUsize) -> usize {
        counter(&self.counters).load(Ordering::SeqCst)
    }

    pub fn last_algorithm(&self) -> Option<SignatureAlgorithm> {
        *self
            .last_algorithm
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a device operation as running for its whole scope
    fn begin_op(&self) -> OpGuard<'_> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.counters.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let delay = self.config().op_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        OpGuard { state: self }
    }
}

struct OpGuard<'a> {
    state: &'a FakeState,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::SeqCst);
    }
}

pub struct FakeDeviceFinder {
    pub state: Arc<FakeState>,
}

impl FakeDeviceFinder {
    pub fn new(state: Arc<FakeState>) -> Self {
        Self { state }
    }
}

impl DeviceFinder for FakeDeviceFinder {
    type Device = FakeDevice;

    fn enumerate(&self) -> YkagentResult<Vec<String>> {
        Ok(self
            .state
            .config()
            .readers
            .iter()
            .map(|r| r.name.clone())
            .collect())
    }

    fn open(&self, reader: &str) -> YkagentResult<Self::Device> {
        let _op = self.state.begin_op();
        let opens = self
            .state
            .config()
            .readers
            .iter()
            .any(|r| r.name == reader && r.opens);
        if !opens {
            return Err(DeviceError::Library(format!("failed to connect to reader {reader}")).into());
        }
        self.state.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.state.set_healthy(true);
        // A new PC/SC session starts with an empty PIN cache
        self.state.pin_cached.store(false, Ordering::SeqCst);
        Ok(FakeDevice {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeDevice {
    state: Arc<FakeState>,
}

impl DeviceConnection for FakeDevice {
    fn serial(&mut self) -> YkagentResult<u32> {
        let _op = self.state.begin_op();
        self.state.counters.serial_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.config().serial)
    }

    fn firmware_major(&mut self) -> u8 {
        self.state.config().firmware_major
    }

    fn is_healthy(&mut self) -> bool {
        let _op = self.state.begin_op();
        self.state.counters.health_checks.fetch_add(1, Ordering::SeqCst);
        self.state.healthy.load(Ordering::SeqCst)
    }

    fn disconnect(self) -> YkagentResult<()> {
        let _op = self.state.begin_op();
        self.state.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PinVerifier for FakeDevice {
    fn verify_pin(&mut self, pin: &Pin) -> YkagentResult<()> {
        let _op = self.state.begin_op();
        self.state
            .counters
            .pin_verifications
            .fetch_add(1, Ordering::SeqCst);
        let mut config = self.state.config();
        if config.retries == 0 {
            return Err(DeviceError::PinLocked.into());
        }
        if pin.as_bytes() == config.pin.as_bytes() {
            config.retries = PIN_ATTEMPTS;
            self.state.pin_cached.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            config.retries -= 1;
            Err(DeviceError::PinRejected {
                attempts_remaining: config.retries,
            }
            .into())
        }
    }

    fn pin_retries(&mut self) -> YkagentResult<u8> {
        let _op = self.state.begin_op();
        Ok(self.state.config().retries)
    }
}

impl KeyReader for FakeDevice {
    fn read_public_key(&mut self, slot: Slot) -> YkagentResult<Option<PublicKey>> {
        let _op = self.state.begin_op();
        self.state.counters.key_reads.fetch_add(1, Ordering::SeqCst);
        if slot != Slot::Authentication {
            return Ok(None);
        }
        Ok(self.state.config().key.as_ref().map(FakeKey::public_key))
    }
}

impl Signer for FakeDevice {
    fn sign(
        &mut self,
        slot: Slot,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        data: &[u8],
    ) -> YkagentResult<SignOutcome> {
        let _op = self.state.begin_op();
        self.state.counters.sign_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .state
            .last_algorithm
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(algorithm);

        let (stored, pin_required, times_out, hook) = {
            let config = self.state.config();
            (
                config.key.clone(),
                config.pin_required,
                config.touch_times_out,
                config.sign_hook.clone(),
            )
        };
        let stored = stored.ok_or_else(|| KeyError::Unavailable {
            slot: slot.to_string(),
        })?;
        if !stored.public_key().matches(key.blob()) {
            return Err(KeyError::NoMatchingKey.into());
        }
        if pin_required && !self.state.pin_cached.load(Ordering::SeqCst) {
            return Ok(SignOutcome::PinRequired);
        }
        if let Some(hook) = hook {
            hook();
        }
        if times_out {
            return Err(DeviceError::Timeout.into());
        }

        let blob = match stored {
            FakeKey::Ed25519(signing_key) => signing_key.sign(data).to_bytes().to_vec(),
            FakeKey::Opaque(_) => data.to_vec(),
        };
        Ok(SignOutcome::Signed(Signature { algorithm, blob }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::piv_contract;

    fn open_fake(pin_required: bool) -> FakeDevice {
        let state = FakeState::new();
        state.configure(|c| c.pin_required = pin_required);
        FakeDeviceFinder::new(state)
            .open(FAKE_READER)
            .expect("fake device opens")
    }

    contract_tests_for!(
        fake_device_contract,
        make = || open_fake(true),
        tests = {
            test_healthy_after_open => piv_contract::test_healthy_after_open,
            test_read_public_key_present => piv_contract::test_read_public_key_present,
            test_pin_verification_success => piv_contract::test_pin_verification_success,
            test_pin_verification_failure => piv_contract::test_pin_verification_failure,
            test_sign_requires_pin_then_succeeds => piv_contract::test_sign_requires_pin_then_succeeds,
            test_sign_rejects_foreign_key => piv_contract::test_sign_rejects_foreign_key,
            test_disconnect => piv_contract::test_disconnect,
        }
    );

    #[test]
    fn test_open_unknown_reader_fails() {
        let finder = FakeDeviceFinder::new(FakeState::new());
        assert!(finder.open("Some Laptop Smartcard Reader").is_err());
        assert_eq!(finder.state.count(|c| &c.opens), 0);
    }

    #[test]
    fn test_pin_locks_after_attempts() {
        let mut device = open_fake(true);
        let wrong = Pin::from_str("000000").unwrap();
        for remaining in (0..PIN_ATTEMPTS).rev() {
            match device.verify_pin(&wrong).unwrap_err() {
                crate::YkagentError::Device(DeviceError::PinRejected { attempts_remaining }) => {
                    assert_eq!(attempts_remaining, remaining)
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(matches!(
            device.verify_pin(&Pin::from_str(FAKE_PIN).unwrap()).unwrap_err(),
            crate::YkagentError::Device(DeviceError::PinLocked)
        ));
    }

    #[test]
    fn test_reopen_clears_pin_cache() {
        let state = FakeState::new();
        state.configure(|c| c.pin_required = true);
        let finder = FakeDeviceFinder::new(Arc::clone(&state));
        let mut device = finder.open(FAKE_READER).unwrap();
        device.verify_pin(&Pin::from_str(FAKE_PIN).unwrap()).unwrap();
        let key = device.read_public_key(Slot::Authentication).unwrap().unwrap();

        let mut reopened = finder.open(FAKE_READER).unwrap();
        let outcome = reopened
            .sign(Slot::Authentication, &key, SignatureAlgorithm::SshEd25519, b"x")
            .unwrap();
        assert_eq!(outcome, SignOutcome::PinRequired);
    }
}
