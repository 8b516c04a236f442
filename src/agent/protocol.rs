//! SSH agent messages
//!
//! Request and response bodies as defined by the ssh-agent protocol
//! (draft-miller-ssh-agent). Framing lives in `wire`.

use crate::error::{AgentError, YkagentResult};
use crate::logic::{SshReader, SshWriter};
use crate::model::{Identity, SignFlags};

pub mod message_type {
    pub const FAILURE: u8 = 5;
    pub const SUCCESS: u8 = 6;
    pub const REQUEST_IDENTITIES: u8 = 11;
    pub const IDENTITIES_ANSWER: u8 = 12;
    pub const SIGN_REQUEST: u8 = 13;
    pub const SIGN_RESPONSE: u8 = 14;
    pub const ADD_IDENTITY: u8 = 17;
    pub const REMOVE_IDENTITY: u8 = 18;
    pub const REMOVE_ALL_IDENTITIES: u8 = 19;
    pub const ADD_SMARTCARD_KEY: u8 = 20;
    pub const REMOVE_SMARTCARD_KEY: u8 = 21;
    pub const LOCK: u8 = 22;
    pub const UNLOCK: u8 = 23;
    pub const ADD_ID_CONSTRAINED: u8 = 25;
    pub const ADD_SMARTCARD_KEY_CONSTRAINED: u8 = 26;
    pub const EXTENSION: u8 = 27;
    pub const EXTENSION_FAILURE: u8 = 28;
}

/// Kind of a decoded request, used for the supported-subset lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    List,
    Sign,
    Add,
    Remove,
    RemoveAll,
    AddSmartcard,
    RemoveSmartcard,
    Lock,
    Unlock,
    Extension,
    Unknown,
}

/// Request kinds the agent serves. Everything else is refused.
pub const SUPPORTED_REQUESTS: &[RequestKind] =
    &[RequestKind::List, RequestKind::Sign, RequestKind::RemoveAll];

impl RequestKind {
    pub fn is_supported(self) -> bool {
        SUPPORTED_REQUESTS.contains(&self)
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestKind::List => "list",
            RequestKind::Sign => "sign",
            RequestKind::Add => "add",
            RequestKind::Remove => "remove",
            RequestKind::RemoveAll => "remove-all",
            RequestKind::AddSmartcard => "add-smartcard",
            RequestKind::RemoveSmartcard => "remove-smartcard",
            RequestKind::Lock => "lock",
            RequestKind::Unlock => "unlock",
            RequestKind::Extension => "extension",
            RequestKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRequest {
    RequestIdentities,
    Sign {
        key_blob: Vec<u8>,
        data: Vec<u8>,
        flags: SignFlags,
    },
    /// Add, remove, smartcard and lock requests; their bodies are never
    /// needed, so they are not parsed
    Management(RequestKind),
    Extension {
        name: String,
    },
    Unknown(u8),
}

impl AgentRequest {
    /// Decode a message body (type byte included, length prefix stripped)
    pub fn decode(body: &[u8]) -> YkagentResult<Self> {
        use message_type::*;

        let mut reader = SshReader::new(body);
        let request = match reader.u8()? {
            REQUEST_IDENTITIES => AgentRequest::RequestIdentities,
            SIGN_REQUEST => {
                let key_blob = reader.string()?.to_vec();
                let data = reader.string()?.to_vec();
                let flags = SignFlags::from_bits(reader.optional_u32()?);
                AgentRequest::Sign {
                    key_blob,
                    data,
                    flags,
                }
            }
            ADD_IDENTITY | ADD_ID_CONSTRAINED => AgentRequest::Management(RequestKind::Add),
            REMOVE_IDENTITY => AgentRequest::Management(RequestKind::Remove),
            REMOVE_ALL_IDENTITIES => AgentRequest::Management(RequestKind::RemoveAll),
            ADD_SMARTCARD_KEY | ADD_SMARTCARD_KEY_CONSTRAINED => {
                AgentRequest::Management(RequestKind::AddSmartcard)
            }
            REMOVE_SMARTCARD_KEY => AgentRequest::Management(RequestKind::RemoveSmartcard),
            LOCK => AgentRequest::Management(RequestKind::Lock),
            UNLOCK => AgentRequest::Management(RequestKind::Unlock),
            EXTENSION => {
                let name = String::from_utf8_lossy(reader.string()?).into_owned();
                AgentRequest::Extension { name }
            }
            other => AgentRequest::Unknown(other),
        };
        Ok(request)
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            AgentRequest::RequestIdentities => RequestKind::List,
            AgentRequest::Sign { .. } => RequestKind::Sign,
            AgentRequest::Management(kind) => *kind,
            AgentRequest::Extension { .. } => RequestKind::Extension,
            AgentRequest::Unknown(_) => RequestKind::Unknown,
        }
    }

    /// The refusal for a request outside the supported subset
    pub fn unsupported(&self) -> AgentError {
        match self {
            AgentRequest::Extension { name } => AgentError::ExtensionUnsupported {
                extension: name.clone(),
            },
            AgentRequest::Unknown(message_type) => AgentError::UnsupportedOperation {
                operation: format!("message type {message_type}"),
            },
            other => AgentError::UnsupportedOperation {
                operation: other.kind().name().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    Success,
    Failure,
    ExtensionFailure,
    Identities(Vec<Identity>),
    /// Encoded SSH signature (`string format, string blob`)
    SignResponse(Vec<u8>),
}

impl AgentResponse {
    /// Encode the message body (without the length prefix)
    pub fn encode(&self) -> Vec<u8> {
        use message_type::*;

        let mut w = SshWriter::new();
        match self {
            AgentResponse::Success => {
                w.put_u8(SUCCESS);
            }
            AgentResponse::Failure => {
                w.put_u8(FAILURE);
            }
            AgentResponse::ExtensionFailure => {
                w.put_u8(EXTENSION_FAILURE);
            }
            AgentResponse::Identities(identities) => {
                w.put_u8(IDENTITIES_ANSWER).put_u32(identities.len() as u32);
                for identity in identities {
                    w.put_string(&identity.key_blob)
                        .put_string(identity.comment.as_bytes());
                }
            }
            AgentResponse::SignResponse(signature) => {
                w.put_u8(SIGN_RESPONSE).put_string(signature);
            }
        }
        w.into_bytes()
    }
}
