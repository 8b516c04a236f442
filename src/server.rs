//! UNIX socket listener
//!
//! One task per client connection. Request handling runs on the blocking
//! pool because the coordinator holds a std mutex across device I/O and
//! PIN dialogs.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

use crate::agent::wire::{read_frame, write_frame};
use crate::agent::Agent;
use crate::error::{AgentError, YkagentResult};
use crate::ports::{DeviceFinder, PresencePrompt};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

// Out of file descriptors; the same values on Linux and macOS
const ENFILE: i32 = 23;
const EMFILE: i32 = 24;

/// Bind a fresh socket at `path`, replacing any stale one and creating the
/// parent directory.
pub fn bind_socket(path: &Path) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!(socket = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Run the agent on `socket_path` until SIGINT or SIGTERM.
///
/// SIGHUP drops the device handle so the next request reconnects.
pub async fn run<F, P>(agent: Agent<F, P>, socket_path: &Path) -> io::Result<()>
where
    F: DeviceFinder + Send + 'static,
    F::Device: Send,
    P: PresencePrompt + 'static,
{
    let listener = bind_socket(socket_path)?;
    info!(socket = %socket_path.display(), "Listening for agent connections");

    let mut hangup = signal(SignalKind::hangup())?;
    let hangup_agent = agent.clone();
    let hangup_watcher = tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, dropping YubiKey transaction...");
            close_session(hangup_agent.clone()).await;
        }
    });

    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    };

    let served = serve(listener, agent.clone(), shutdown).await;
    hangup_watcher.abort();

    info!("Shutting down");
    close_session(agent).await;
    if let Err(e) = std::fs::remove_file(socket_path) {
        warn!(socket = %socket_path.display(), "Failed to remove socket: {}", e);
    }
    served
}

/// Accept connections until `shutdown` resolves
pub async fn serve<F, P, S>(listener: UnixListener, agent: Agent<F, P>, shutdown: S) -> io::Result<()>
where
    F: DeviceFinder + Send + 'static,
    F::Device: Send,
    P: PresencePrompt + 'static,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let agent = agent.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, agent).await {
                            debug!("Connection ended: {}", e);
                        }
                    });
                }
                Err(e) if is_temporary(&e) => {
                    warn!("Temporary accept error: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Accept failures worth retrying; anything else stops the listener
fn is_temporary(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory
    ) || matches!(err.raw_os_error(), Some(ENFILE | EMFILE))
}

async fn handle_connection<S, F, P>(mut stream: S, agent: Agent<F, P>) -> YkagentResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: DeviceFinder + Send + 'static,
    F::Device: Send,
    P: PresencePrompt + 'static,
{
    while let Some(body) = read_frame(&mut stream).await? {
        let agent = agent.clone();
        let reply = tokio::task::spawn_blocking(move || agent.handle_message(&body))
            .await
            .map_err(|e| AgentError::Protocol {
                reason: format!("request handler failed: {e}"),
            })?;
        write_frame(&mut stream, &reply).await?;
    }
    Ok(())
}

async fn close_session<F, P>(agent: Agent<F, P>)
where
    F: DeviceFinder + Send + 'static,
    F::Device: Send,
    P: PresencePrompt + 'static,
{
    match tokio::task::spawn_blocking(move || agent.coordinator().close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to close YubiKey session: {}", e),
        Err(e) => warn!("Close task failed: {}", e),
    }
}
