//! ssh-agent front end
//!
//! Maps decoded requests onto the signing coordinator. Only the requests in
//! `SUPPORTED_REQUESTS` ever reach the device.

pub mod protocol;
pub mod wire;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::coordinator::SigningCoordinator;
use crate::error::YkagentResult;
use crate::logic::ssh_encoding::encode_signature;
use crate::ports::{DeviceFinder, PresencePrompt};

pub use protocol::{AgentRequest, AgentResponse, RequestKind, SUPPORTED_REQUESTS};

pub struct Agent<F: DeviceFinder, P: PresencePrompt + 'static> {
    coordinator: Arc<SigningCoordinator<F, P>>,
}

impl<F, P> Clone for Agent<F, P>
where
    F: DeviceFinder,
    P: PresencePrompt + 'static,
{
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<F, P> Agent<F, P>
where
    F: DeviceFinder,
    P: PresencePrompt + 'static,
{
    pub fn new(coordinator: Arc<SigningCoordinator<F, P>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &SigningCoordinator<F, P> {
        &self.coordinator
    }

    /// Serve one request. Blocks while the device is busy or waiting for
    /// the user.
    pub fn handle(&self, request: AgentRequest) -> AgentResponse {
        let kind = request.kind();
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) if e.is_unsupported() => {
                debug!(request = kind.name(), "Refusing request: {}", e);
                match kind {
                    RequestKind::Extension => AgentResponse::ExtensionFailure,
                    _ => AgentResponse::Failure,
                }
            }
            Err(e) => {
                warn!(request = kind.name(), "Request failed: {}", e);
                AgentResponse::Failure
            }
        }
    }

    /// Decode a message body, serve it and encode the reply
    pub fn handle_message(&self, body: &[u8]) -> Vec<u8> {
        match AgentRequest::decode(body) {
            Ok(request) => self.handle(request).encode(),
            Err(e) => {
                warn!("Malformed agent request: {}", e);
                AgentResponse::Failure.encode()
            }
        }
    }

    fn dispatch(&self, request: AgentRequest) -> YkagentResult<AgentResponse> {
        if !request.kind().is_supported() {
            return Err(request.unsupported().into());
        }
        match request {
            AgentRequest::RequestIdentities => {
                let identities = self.coordinator.list_identities()?;
                Ok(AgentResponse::Identities(identities))
            }
            AgentRequest::Sign {
                key_blob,
                data,
                flags,
            } => {
                let signature = self.coordinator.sign(&key_blob, &data, flags)?;
                Ok(AgentResponse::SignResponse(encode_signature(&signature)))
            }
            AgentRequest::Management(RequestKind::RemoveAll) => {
                self.coordinator.close()?;
                Ok(AgentResponse::Success)
            }
            other => Err(other.unsupported().into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_device::{FakeDeviceFinder, FakeState};
    use crate::adapters::fake_prompt::RecordingPrompt;
    use crate::config::AgentConfig;
    use crate::logic::{SshReader, SshWriter};
    use crate::model::{ReleasePolicy, SignFlags};
    use protocol::message_type;
    use std::time::Duration;

    fn agent(state: &Arc<FakeState>) -> Agent<FakeDeviceFinder, RecordingPrompt> {
        let config = AgentConfig {
            touch_grace: Duration::from_millis(1),
            release_policy: ReleasePolicy::KEEP,
            ..AgentConfig::default()
        };
        let coordinator = SigningCoordinator::new(
            FakeDeviceFinder::new(Arc::clone(state)),
            Arc::new(RecordingPrompt::new()),
            &config,
        );
        Agent::new(Arc::new(coordinator))
    }

    fn device_interactions(state: &FakeState) -> usize {
        state.count(|c| &c.opens)
            + state.count(|c| &c.closes)
            + state.count(|c| &c.key_reads)
            + state.count(|c| &c.pin_verifications)
            + state.count(|c| &c.sign_calls)
    }

    #[test]
    fn test_management_requests_never_touch_the_device() {
        let state = FakeState::new();
        let agent = agent(&state);

        for kind in [
            RequestKind::Add,
            RequestKind::Remove,
            RequestKind::Lock,
            RequestKind::Unlock,
            RequestKind::AddSmartcard,
            RequestKind::RemoveSmartcard,
        ] {
            let err = agent.dispatch(AgentRequest::Management(kind)).unwrap_err();
            assert!(err.is_unsupported(), "{} was not refused", kind.name());
            assert_eq!(
                agent.handle(AgentRequest::Management(kind)),
                AgentResponse::Failure
            );
        }

        assert_eq!(device_interactions(&state), 0);
    }

    #[test]
    fn test_remove_all_closes_session_once() {
        let state = FakeState::new();
        let agent = agent(&state);
        agent.handle(AgentRequest::RequestIdentities);

        let response = agent.handle(AgentRequest::Management(RequestKind::RemoveAll));

        assert_eq!(response, AgentResponse::Success);
        assert_eq!(state.count(|c| &c.closes), 1);
    }

    #[test]
    fn test_extension_gets_extension_failure() {
        let state = FakeState::new();
        let agent = agent(&state);

        let response = agent.handle(AgentRequest::Extension {
            name: "query".to_string(),
        });

        assert_eq!(response, AgentResponse::ExtensionFailure);
        assert_eq!(device_interactions(&state), 0);
    }

    #[test]
    fn test_unknown_message_fails() {
        let state = FakeState::new();
        let agent = agent(&state);

        assert_eq!(agent.handle_message(&[200]), vec![message_type::FAILURE]);
        assert_eq!(agent.handle_message(&[]), vec![message_type::FAILURE]);
    }

    #[test]
    fn test_list_then_sign_round_trip() {
        let state = FakeState::new();
        let agent = agent(&state);

        let listed = agent.handle_message(&[message_type::REQUEST_IDENTITIES]);
        let mut reader = SshReader::new(&listed);
        assert_eq!(reader.u8().unwrap(), message_type::IDENTITIES_ANSWER);
        assert_eq!(reader.u32().unwrap(), 1);
        let key_blob = reader.string().unwrap().to_vec();

        let mut w = SshWriter::new();
        w.put_u8(message_type::SIGN_REQUEST)
            .put_string(&key_blob)
            .put_string(b"challenge")
            .put_u32(SignFlags::NONE.bits());
        let signed = agent.handle_message(&w.into_bytes());

        let mut reader = SshReader::new(&signed);
        assert_eq!(reader.u8().unwrap(), message_type::SIGN_RESPONSE);
        let mut signature = SshReader::new(reader.string().unwrap());
        assert_eq!(signature.string().unwrap(), b"ssh-ed25519");
        assert_eq!(signature.string().unwrap().len(), 64);
    }

    #[test]
    fn test_device_failure_becomes_failure_response() {
        let state = FakeState::without_devices();
        let agent = agent(&state);

        assert_eq!(
            agent.handle(AgentRequest::RequestIdentities),
            AgentResponse::Failure
        );
    }
}
