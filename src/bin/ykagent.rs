use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{info, warn};

use ykagent::{
    adapters::{DesktopPrompt, PivDeviceFinder},
    server, Agent, AgentConfig, ReleasePolicy, SigningCoordinator, Slot,
};

#[derive(Parser, Debug)]
#[command(name = "ykagent")]
#[command(about = "SSH agent for the PIV key on a YubiKey", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Path of the UNIX socket to listen on
    #[arg(short = 'l', long = "listen", env = "YKAGENT_SOCKET")]
    pub listen: PathBuf,

    /// PIV slot holding the SSH key (9a=Authentication, 9c=Signature, 9d=KeyManagement, 9e=CardAuthentication)
    #[arg(long, default_value = "authentication")]
    pub slot: SlotArg,

    /// Close the YubiKey after every request so other programs can use it.
    /// Defaults to true on macOS and false elsewhere
    #[arg(long, env = "YKAGENT_RELEASE")]
    pub release_after_use: Option<bool>,

    /// Delay between showing the touch dialog and starting the signature
    #[arg(long, default_value_t = 100)]
    pub touch_grace_ms: u64,

    /// Icon shown in PIN and touch dialogs
    #[arg(long, env = "YKAGENT_ICON")]
    pub icon: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SlotArg {
    Authentication,
    Signature,
    KeyManagement,
    CardAuthentication,
}

impl From<SlotArg> for Slot {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Authentication => Slot::Authentication,
            SlotArg::Signature => Slot::Signature,
            SlotArg::KeyManagement => Slot::KeyManagement,
            SlotArg::CardAuthentication => Slot::CardAuthentication,
        }
    }
}

impl Cli {
    fn config(&self) -> AgentConfig {
        AgentConfig {
            socket_path: self.listen.clone(),
            slot: self.slot.into(),
            release_policy: self
                .release_after_use
                .map(ReleasePolicy::new)
                .unwrap_or_else(ReleasePolicy::for_platform),
            touch_grace: Duration::from_millis(self.touch_grace_ms),
            icon: self.icon.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .init();

    let config = cli.config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        slot = %config.slot,
        release_policy = ?config.release_policy,
        "Starting ykagent"
    );

    if std::io::stdin().is_terminal() {
        warn!("ykagent is meant to run as a background daemon.");
        warn!("Running multiple instances is likely to lead to conflicts.");
        warn!("Consider using the launchd or systemd services.");
    }

    let coordinator = SigningCoordinator::new(PivDeviceFinder, Arc::new(DesktopPrompt::new()), &config);
    let agent = Agent::new(Arc::new(coordinator));

    server::run(agent, &config.socket_path)
        .await
        .with_context(|| format!("failed to serve on {}", config.socket_path.display()))?;

    Ok(())
}
