//! Agent configuration
//!
//! Built by the binary from command line flags and environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::{ReleasePolicy, Slot};

/// Pause between launching the touch dialog and issuing the blocking sign
/// call, so the dialog is on screen before the card starts waiting.
pub const DEFAULT_TOUCH_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// UNIX socket the agent listens on
    pub socket_path: PathBuf,
    /// Slot holding the SSH key
    pub slot: Slot,
    /// Whether to drop the device handle after each operation
    pub release_policy: ReleasePolicy,
    pub touch_grace: Duration,
    /// Icon shown in PIN and touch dialogs
    pub icon: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            socket_path: std::env::temp_dir().join("ykagent.sock"),
            slot: Slot::default_ssh(),
            release_policy: ReleasePolicy::for_platform(),
            touch_grace: DEFAULT_TOUCH_GRACE,
            icon: None,
        }
    }
}
