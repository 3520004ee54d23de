// protocol/state_machine.rs - Shared protocol state machine pieces

use crate::acl_message::{AgentId, Performative, PriceParseError};
use crate::transport::{MessageTemplate, TransportError};
use std::fmt::Debug;

/// Protocol error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed price from {sender}: {source}")]
    MalformedPrice {
        sender: AgentId,
        #[source]
        source: PriceParseError,
    },

    #[error("Reply from unknown sender {0}")]
    UnknownSender(AgentId),

    #[error("Duplicate reply from {0}")]
    DuplicateReply(AgentId),

    #[error("Unexpected {performative} from {sender} in state {state}")]
    ProtocolViolation {
        state: &'static str,
        performative: Performative,
        sender: AgentId,
    },

    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: &'static str, event: String },

    #[error("Auction session already closed")]
    SessionClosed,

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Errors that drop the offending message and leave the current state running.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedPrice { .. }
                | ProtocolError::UnknownSender(_)
                | ProtocolError::DuplicateReply(_)
                | ProtocolError::ProtocolViolation { .. }
        )
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::MalformedPrice { .. } => "malformed_price",
            ProtocolError::UnknownSender(_) => "unknown_sender",
            ProtocolError::DuplicateReply(_) => "duplicate_reply",
            ProtocolError::ProtocolViolation { .. } => "protocol_violation",
            ProtocolError::InvalidTransition { .. } => "invalid_transition",
            ProtocolError::SessionClosed => "session_closed",
            ProtocolError::Timeout => "timeout",
            ProtocolError::Transport(_) => "transport",
        }
    }
}

/// Role in a protocol conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Broadcasts the call and decides
    Initiator,
    /// Answers the call
    Participant,
}

/// Common surface of the buyer and seller state machines.
///
/// Both machines are sans-IO: they consume inbound messages and hand back
/// outbound ones, and the agent loop owns the transport.
pub trait ProtocolStateMachine: Send + Debug {
    /// Our role in the conversation
    fn role(&self) -> Role;

    /// Current state name (for logging)
    fn state_name(&self) -> &'static str;

    /// Whether the machine reached a terminal state
    fn is_complete(&self) -> bool;

    /// Performatives the current state is willing to receive
    fn expected_performatives(&self) -> Vec<Performative>;

    /// Selective-receive template for the current state, if it receives at all
    fn receive_template(&self) -> Option<MessageTemplate>;
}
