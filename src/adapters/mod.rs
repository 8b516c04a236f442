//! Adapters - concrete implementations of ports (traits)

mod desktop_prompt;
mod yubikey_piv;

#[cfg(test)]
pub mod fake_device;
#[cfg(test)]
pub mod fake_prompt;

pub use desktop_prompt::DesktopPrompt;
pub use yubikey_piv::{PivDeviceFinder, PivYubiKey};
