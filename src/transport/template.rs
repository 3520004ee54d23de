// transport/template.rs - Selective receive templates

use crate::acl_message::{AclMessage, AgentId, Performative};
use std::collections::HashSet;

/// Predicate over inbound messages, used for selective receive.
///
/// Templates compose with [`MessageTemplate::and`] and [`MessageTemplate::or`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTemplate {
    /// Matches every message
    Any,
    Performative(Performative),
    OneOfPerformatives(Vec<Performative>),
    Sender(AgentId),
    OneOfSenders(HashSet<AgentId>),
    Conversation(String),
    And(Box<MessageTemplate>, Box<MessageTemplate>),
    Or(Box<MessageTemplate>, Box<MessageTemplate>),
}

impl MessageTemplate {
    pub fn match_performative(performative: Performative) -> Self {
        Self::Performative(performative)
    }

    pub fn match_performatives(performatives: impl IntoIterator<Item = Performative>) -> Self {
        Self::OneOfPerformatives(performatives.into_iter().collect())
    }

    pub fn match_sender(sender: AgentId) -> Self {
        Self::Sender(sender)
    }

    pub fn match_senders(senders: impl IntoIterator<Item = AgentId>) -> Self {
        Self::OneOfSenders(senders.into_iter().collect())
    }

    pub fn match_conversation(conversation_id: impl Into<String>) -> Self {
        Self::Conversation(conversation_id.into())
    }

    pub fn and(self, other: MessageTemplate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: MessageTemplate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, msg: &AclMessage) -> bool {
        match self {
            Self::Any => true,
            Self::Performative(p) => msg.performative == *p,
            Self::OneOfPerformatives(ps) => ps.contains(&msg.performative),
            Self::Sender(s) => msg.sender == *s,
            Self::OneOfSenders(ss) => ss.contains(&msg.sender),
            Self::Conversation(c) => msg.conversation_id.as_deref() == Some(c.as_str()),
            Self::And(a, b) => a.matches(msg) && b.matches(msg),
            Self::Or(a, b) => a.matches(msg) || b.matches(msg),
        }
    }
}
