// transport/mod.rs - Message Transport

//! Message transport used by the auction agents.
//!
//! The protocols treat the transport as an external collaborator that
//! delivers typed messages to named agents and supports selective,
//! blocking receipt by [`MessageTemplate`].
//!
//! - `MessageTransport` - the seam the agents are written against
//! - `LocalBus` - in-process implementation, one mailbox per agent
//!
//! Delivery is at-least-once and unordered across senders. A receive
//! without a timeout suspends the caller until a matching message exists.

mod local;
mod template;

pub use local::LocalBus;
pub use template::MessageTemplate;

use crate::acl_message::{AclMessage, AgentId, Performative};
use async_trait::async_trait;
use std::time::Duration;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Agent already registered: {0}")]
    AlreadyRegistered(AgentId),

    #[error("Message has no receivers")]
    NoReceivers,

    #[error("Transport closed")]
    Closed,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Point-to-point delivery with selective receive
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Create a mailbox for an agent
    fn register(&self, agent: &AgentId) -> Result<(), TransportError>;

    /// Deliver one copy of the message to every receiver
    async fn send(&self, msg: AclMessage) -> Result<(), TransportError>;

    /// Take the oldest queued message for `agent` matching `template`.
    ///
    /// Non-matching messages stay queued. With `timeout` of `None` this
    /// waits until a matching message arrives or the transport closes.
    async fn receive(
        &self,
        agent: &AgentId,
        template: &MessageTemplate,
        timeout: Option<Duration>,
    ) -> Result<AclMessage, TransportError>;
}

/// Send `performative` with `content` to every receiver as one message
/// tagged with `conversation_id`.
pub async fn broadcast<T: MessageTransport + ?Sized>(
    transport: &T,
    sender: &AgentId,
    performative: Performative,
    receivers: &[AgentId],
    content: impl Into<String>,
    conversation_id: &str,
) -> Result<(), TransportError> {
    if receivers.is_empty() {
        return Err(TransportError::NoReceivers);
    }
    let msg = AclMessage::new(performative, sender.clone(), receivers.to_vec())
        .with_content(content)
        .with_conversation(conversation_id);
    transport.send(msg).await
}

/// Send `performative` with `content` to a single receiver within
/// `conversation_id`.
pub async fn send_to<T: MessageTransport + ?Sized>(
    transport: &T,
    sender: &AgentId,
    performative: Performative,
    receiver: &AgentId,
    content: impl Into<String>,
    conversation_id: &str,
) -> Result<(), TransportError> {
    let msg = AclMessage::new(performative, sender.clone(), vec![receiver.clone()])
        .with_content(content)
        .with_conversation(conversation_id);
    transport.send(msg).await
}
