//! Ports (algebras/traits) for device and UI operations
//!
//! The session and signing coordinator depend on these abstractions, not
//! on the PC/SC stack or a dialog toolkit.

mod connection;
mod device_finder;
mod key_reader;
mod pin_verifier;
mod presence_prompt;
mod signer;


pub use connection::DeviceConnection;
pub use device_finder::DeviceFinder;
pub use key_reader::KeyReader;
pub use pin_verifier::PinVerifier;
pub use presence_prompt::PresencePrompt;
pub use signer::{SignOutcome, Signer};

/// Combined trait for everything the agent asks of a device
///
/// A device handle typically implements this.
pub trait PivDevice: DeviceConnection + PinVerifier + KeyReader + Signer {}

// Blanket implementation for types that implement all operation traits
impl<T> PivDevice for T where T: DeviceConnection + PinVerifier + KeyReader + Signer {}
