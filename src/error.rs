//! Error types for ykagent
//!
//! This module defines the error hierarchy for all agent operations.
//! Errors are organized hierarchically and use thiserror for implementation.

use thiserror::Error;

/// Result type alias for ykagent operations
///
/// This is a convenience alias for `Result<T, YkagentError>`.
pub type YkagentResult<T> = Result<T, YkagentError>;

/// Top-level error type for all ykagent operations
#[derive(Error, Debug)]
pub enum YkagentError {
    /// YubiKey device and session errors
    #[error("YubiKey device error: {0}")]
    Device(#[from] DeviceError),

    /// Key resolution errors
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Agent protocol errors
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Domain validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Presence prompt (PIN / touch dialog) errors
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
}

/// YubiKey device-related errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No YubiKey could be opened
    #[error("could not reach YubiKey: {reason}")]
    Unavailable { reason: String },

    /// The open handle failed its health check
    #[error("YubiKey session is stale")]
    StaleSession,

    /// The session was closed while an operation needed it
    #[error("YubiKey session is closed")]
    SessionClosed,

    /// The device rejected the PIN
    #[error("wrong PIN: attempts remaining: {attempts_remaining}")]
    PinRejected { attempts_remaining: u8 },

    /// The PIN is blocked
    #[error("YubiKey is locked - too many failed PIN attempts")]
    PinLocked,

    /// The user dismissed the PIN prompt
    #[error("PIN entry cancelled")]
    PinCancelled,

    /// The key was not touched within the hardware touch window
    #[error("timed out waiting for YubiKey touch")]
    Timeout,

    /// Underlying yubikey crate error
    #[error("YubiKey library error: {0}")]
    Library(String),
}

/// Errors resolving or matching the key held on the device
#[derive(Error, Debug)]
pub enum KeyError {
    /// The slot holds no certificate
    #[error("no key found in slot {slot}")]
    Unavailable { slot: String },

    /// The requested key is not the one on the device
    #[error("no private keys match the requested public key")]
    NoMatchingKey,

    /// The certificate carries a key type the agent cannot use
    #[error("unexpected public key type: {algorithm}")]
    UnsupportedKeyType { algorithm: String },

    /// Key or signature bytes could not be decoded
    #[error("invalid key encoding: {reason}")]
    InvalidEncoding { reason: String },
}

/// Agent protocol errors
#[derive(Error, Debug)]
pub enum AgentError {
    /// Management request the agent does not implement
    #[error("operation unsupported: {operation}")]
    UnsupportedOperation { operation: String },

    /// Protocol extension the agent does not implement
    #[error("extension unsupported: {extension}")]
    ExtensionUnsupported { extension: String },

    /// Malformed frame or message
    #[error("protocol error: {reason}")]
    Protocol { reason: String },
}

/// Domain validation errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// PIN validation error
    #[error("PIN validation error: {0}")]
    Pin(#[from] crate::model::PinError),

    /// Slot error
    #[error("Slot error: {0}")]
    Slot(#[from] crate::model::SlotError),
}

/// Errors raised while rendering PIN or touch dialogs
#[derive(Error, Debug)]
pub enum PromptError {
    /// No dialog mechanism exists on this platform
    #[error("no prompt mechanism available: {reason}")]
    Unavailable { reason: String },

    /// The dialog helper failed
    #[error("prompt failed: {reason}")]
    Failed { reason: String },
}

impl YkagentError {
    /// Whether this error is a request the agent deliberately refuses.
    ///
    /// Such refusals are routine and are not logged as failures.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            YkagentError::Agent(
                AgentError::UnsupportedOperation { .. } | AgentError::ExtensionUnsupported { .. }
            )
        )
    }
}

impl From<crate::model::PinError> for YkagentError {
    fn from(err: crate::model::PinError) -> Self {
        YkagentError::Domain(DomainError::Pin(err))
    }
}

impl From<crate::model::SlotError> for YkagentError {
    fn from(err: crate::model::SlotError) -> Self {
        YkagentError::Domain(DomainError::Slot(err))
    }
}

/// Convert yubikey crate errors to our error type
impl From<yubikey::Error> for YkagentError {
    fn from(err: yubikey::Error) -> Self {
        match err {
            yubikey::Error::WrongPin { tries } => YkagentError::Device(DeviceError::PinRejected {
                attempts_remaining: tries,
            }),
            yubikey::Error::PinLocked => YkagentError::Device(DeviceError::PinLocked),
            other => YkagentError::Device(DeviceError::Library(other.to_string())),
        }
    }
}

impl From<der::Error> for YkagentError {
    fn from(err: der::Error) -> Self {
        YkagentError::Key(KeyError::InvalidEncoding {
            reason: err.to_string(),
        })
    }
}
