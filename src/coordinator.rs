//! Signing coordination
//!
//! `SigningCoordinator` serializes every device operation behind one lock
//! and drives a sign request through its phases:
//!
//! ```text
//! EnsuringSession -> ResolvingSigner -> AwaitingPresence -> InDeviceOperation -> Signed | Failed
//! ```
//!
//! While awaiting presence, a detached thread shows the touch dialog. It
//! never takes the device lock and is never joined; its failures are
//! logged and turned into a notification.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{DeviceError, DomainError, KeyError, YkagentError, YkagentResult};
use crate::model::{
    DeviceIdentity, Identity, KeyHandle, PinRequest, SignFlags, Signature, Slot, TouchRequest,
};
use crate::ports::{DeviceFinder, KeyReader, PinVerifier, PresencePrompt, SignOutcome, Signer};
use crate::session::DeviceSession;

const TOUCH_NOTIFICATION: &str = "Waiting for YubiKey touch...";

/// Where a sign request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPhase {
    Idle,
    EnsuringSession,
    ResolvingSigner,
    AwaitingPresence,
    InDeviceOperation,
    Signed,
}

impl fmt::Display for SignPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignPhase::Idle => "idle",
            SignPhase::EnsuringSession => "ensuring-session",
            SignPhase::ResolvingSigner => "resolving-signer",
            SignPhase::AwaitingPresence => "awaiting-presence",
            SignPhase::InDeviceOperation => "in-device-operation",
            SignPhase::Signed => "signed",
        };
        f.write_str(name)
    }
}

pub struct SigningCoordinator<F: DeviceFinder, P: PresencePrompt + 'static> {
    session: Mutex<DeviceSession<F>>,
    prompt: Arc<P>,
    slot: Slot,
    touch_grace: Duration,
    icon: Option<PathBuf>,
}

impl<F, P> SigningCoordinator<F, P>
where
    F: DeviceFinder,
    P: PresencePrompt + 'static,
{
    pub fn new(finder: F, prompt: Arc<P>, config: &AgentConfig) -> Self {
        Self {
            session: Mutex::new(DeviceSession::new(finder, config.release_policy)),
            prompt,
            slot: config.slot,
            touch_grace: config.touch_grace,
            icon: config.icon.clone(),
        }
    }

    // Every session mutation is a single assignment, so the state behind a
    // poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, DeviceSession<F>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The key in the configured slot, as one identity
    pub fn list_identities(&self) -> YkagentResult<Vec<Identity>> {
        let mut session = self.lock();
        let result = self.list_locked(&mut session);
        session.release();
        result
    }

    fn list_locked(&self, session: &mut DeviceSession<F>) -> YkagentResult<Vec<Identity>> {
        let (identity, device) = session.ensure()?;
        let handle = resolve_key(device, self.slot)?;
        debug!(serial = identity.serial, slot = %self.slot, "Listing identity");
        Ok(vec![Identity::for_key(&handle, identity)])
    }

    /// Sign `data` with the device key, which must match `key_blob` exactly
    pub fn sign(&self, key_blob: &[u8], data: &[u8], flags: SignFlags) -> YkagentResult<Signature> {
        let mut session = self.lock();
        let mut phase = SignPhase::Idle;
        let result = self.sign_locked(&mut session, &mut phase, key_blob, data, flags);
        session.release();
        match &result {
            Ok(signature) => {
                info!(algorithm = %signature.algorithm, "Signed request");
            }
            Err(e) => {
                debug!(phase = %phase, "Sign request failed: {}", e);
            }
        }
        result
    }

    fn sign_locked(
        &self,
        session: &mut DeviceSession<F>,
        phase: &mut SignPhase,
        key_blob: &[u8],
        data: &[u8],
        flags: SignFlags,
    ) -> YkagentResult<Signature> {
        *phase = SignPhase::EnsuringSession;
        let (identity, device) = session.ensure()?;

        *phase = SignPhase::ResolvingSigner;
        let handle = resolve_key(device, self.slot)?;
        if !handle.public_key.matches(key_blob) {
            return Err(KeyError::NoMatchingKey.into());
        }
        let algorithm = handle.public_key.algorithm().signature_for(flags);
        debug!(
            serial = identity.serial,
            algorithm = %algorithm,
            flags = flags.bits(),
            "Resolved signer"
        );

        *phase = SignPhase::AwaitingPresence;
        self.spawn_touch_prompt(identity);
        thread::sleep(self.touch_grace);

        *phase = SignPhase::InDeviceOperation;
        let key = &handle.public_key;
        let outcome = match device.sign(self.slot, key, algorithm, data)? {
            SignOutcome::PinRequired => {
                self.unlock(device, identity)?;
                device.sign(self.slot, key, algorithm, data)?
            }
            signed => signed,
        };

        match outcome {
            SignOutcome::Signed(signature) => {
                *phase = SignPhase::Signed;
                Ok(signature)
            }
            SignOutcome::PinRequired => Err(DeviceError::Library(
                "card still requires a PIN after verification".to_string(),
            )
            .into()),
        }
    }

    /// Prompt for the PIN until the card accepts it or runs out of attempts
    fn unlock<D: PinVerifier>(&self, device: &mut D, identity: DeviceIdentity) -> YkagentResult<()> {
        loop {
            let retries_remaining = match device.pin_retries() {
                Ok(0) => return Err(DeviceError::PinLocked.into()),
                Ok(retries) => retries,
                Err(e) => {
                    debug!("Could not read PIN retries: {}", e);
                    0
                }
            };
            let request = PinRequest {
                identity,
                retries_remaining,
                icon: self.icon.clone(),
            };
            let pin = match self.prompt.request_pin(&request) {
                Ok(Some(pin)) => pin,
                Ok(None) => return Err(DeviceError::PinCancelled.into()),
                // Rejected before reaching the card, so no attempt was spent
                Err(YkagentError::Domain(DomainError::Pin(e))) => {
                    warn!("Invalid PIN entered, asking again: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match device.verify_pin(&pin) {
                Ok(()) => return Ok(()),
                Err(YkagentError::Device(DeviceError::PinRejected { attempts_remaining }))
                    if attempts_remaining > 0 =>
                {
                    warn!(attempts_remaining, "Wrong PIN, asking again");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn spawn_touch_prompt(&self, identity: DeviceIdentity) {
        let prompt = Arc::clone(&self.prompt);
        let request = TouchRequest {
            identity,
            icon: self.icon.clone(),
        };
        let spawned = thread::Builder::new()
            .name("touch-prompt".to_string())
            .spawn(move || match prompt.request_touch(&request) {
                Ok(outcome) => debug!(?outcome, "Touch prompt finished"),
                Err(e) => {
                    warn!("Touch prompt failed: {}", e);
                    prompt.notify(TOUCH_NOTIFICATION);
                }
            });
        if let Err(e) = spawned {
            warn!("Could not start touch prompt: {}", e);
            self.prompt.notify(TOUCH_NOTIFICATION);
        }
    }

    /// Drop the device handle; the next request reconnects
    pub fn close(&self) -> YkagentResult<()> {
        self.lock().close()
    }
}

fn resolve_key<D: KeyReader>(device: &mut D, slot: Slot) -> YkagentResult<KeyHandle> {
    let public_key = device
        .read_public_key(slot)?
        .ok_or_else(|| KeyError::Unavailable {
            slot: slot.to_string(),
        })?;
    Ok(KeyHandle { slot, public_key })
}
