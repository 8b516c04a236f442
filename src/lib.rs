//! ssh-agent backed by a key in the PIV applet of a YubiKey
//!
//! The device is reached through ports (`ports`) so that the session
//! lifecycle and signing flow can be exercised without hardware.

pub mod adapters;
pub mod agent;
pub mod config;
pub mod coordinator;
pub mod error;
mod logic;
pub mod model;
pub mod ports;
pub mod server;
pub mod session;

pub use agent::Agent;
pub use config::AgentConfig;
pub use coordinator::{SignPhase, SigningCoordinator};
pub use error::{YkagentError, YkagentResult};
pub use model::{Identity, ReleasePolicy, SignFlags, Signature, Slot};
pub use session::DeviceSession;
