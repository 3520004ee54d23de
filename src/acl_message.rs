// acl_message.rs
// Core ACL message structures for the procurement auction

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent identifier.
///
/// An opaque, comparable name token. Two identifiers are the same agent
/// exactly when their names are equal (case-sensitive).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[display("{name}")]
#[serde(transparent)]
pub struct AgentId {
    pub name: String,
}

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Performatives used by the one-round auction.
///
/// The vocabulary is closed: nothing outside these five is ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Performative {
    CallForProposals,
    Propose,
    Refuse,
    Accept,
    Reject,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Performative::CallForProposals => "CALL_FOR_PROPOSALS",
            Performative::Propose => "PROPOSE",
            Performative::Refuse => "REFUSE",
            Performative::Accept => "ACCEPT",
            Performative::Reject => "REJECT",
        }
    }

    /// Whether the content of this performative is a price.
    pub fn carries_price(&self) -> bool {
        matches!(
            self,
            Performative::Propose | Performative::Accept | Performative::Reject
        )
    }
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content could not be read as a non-negative integer price
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed price {content:?}")]
pub struct PriceParseError {
    pub content: String,
}

/// Parse a price carried as message content.
///
/// Only plain decimal digits are accepted; signs and surrounding
/// whitespace are rejected.
pub fn parse_price(content: &str) -> Result<u64, PriceParseError> {
    if content.is_empty() || !content.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PriceParseError {
            content: content.to_string(),
        });
    }
    content.parse::<u64>().map_err(|_| PriceParseError {
        content: content.to_string(),
    })
}

/// Complete ACL message. Immutable once handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclMessage {
    pub message_id: String,
    pub performative: Performative,
    pub sender: AgentId,
    pub receivers: Vec<AgentId>,
    pub content: String,
    pub conversation_id: Option<String>,
    pub in_reply_to: Option<String>,
    /// Milliseconds since the Unix epoch
    pub sent_at: i64,
}

impl AclMessage {
    pub fn new(performative: Performative, sender: AgentId, receivers: Vec<AgentId>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            performative,
            sender,
            receivers,
            content: String::new(),
            conversation_id: None,
            in_reply_to: None,
            sent_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Build a reply addressed back to this message's sender, keeping the conversation.
    pub fn create_reply(&self, sender: AgentId, performative: Performative) -> AclMessage {
        AclMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            performative,
            sender,
            receivers: vec![self.sender.clone()],
            content: String::new(),
            conversation_id: self.conversation_id.clone(),
            in_reply_to: Some(self.message_id.clone()),
            sent_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Content read as a price
    pub fn price(&self) -> Result<u64, PriceParseError> {
        parse_price(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = AclMessage::new(
            Performative::CallForProposals,
            AgentId::new("JACK"),
            vec![AgentId::new("LILI"), AgentId::new("Lola")],
        )
        .with_content("Looking for a bike")
        .with_conversation("conv-1");

        assert_eq!(msg.performative, Performative::CallForProposals);
        assert_eq!(msg.receivers.len(), 2);
        assert_eq!(msg.conversation_id.as_deref(), Some("conv-1"));
        assert!(msg.in_reply_to.is_none());
    }

    #[test]
    fn test_reply_goes_back_to_sender() {
        let cfp = AclMessage::new(
            Performative::CallForProposals,
            AgentId::new("JACK"),
            vec![AgentId::new("LULU")],
        )
        .with_conversation("conv-1");

        let reply = cfp
            .create_reply(AgentId::new("LULU"), Performative::Propose)
            .with_content("2400");

        assert_eq!(reply.receivers, vec![AgentId::new("JACK")]);
        assert_eq!(reply.sender, AgentId::new("LULU"));
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(reply.in_reply_to.as_deref(), Some(cfp.message_id.as_str()));
        assert_eq!(reply.price(), Ok(2400));
    }

    #[test]
    fn test_parse_price_rejects_non_digits() {
        assert_eq!(parse_price("0"), Ok(0));
        assert_eq!(parse_price("2700"), Ok(2700));
        assert!(parse_price("").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("+5").is_err());
        assert!(parse_price(" 12").is_err());
        assert!(parse_price("no stock").is_err());
        assert!(parse_price("99999999999999999999999").is_err());
    }

    #[test]
    fn test_performative_wire_names() {
        let json = serde_json::to_string(&Performative::CallForProposals).unwrap();
        assert_eq!(json, "\"CALL_FOR_PROPOSALS\"");
        assert_eq!(Performative::Reject.to_string(), "REJECT");
        assert!(Performative::Accept.carries_price());
        assert!(!Performative::Refuse.carries_price());
    }

    #[test]
    fn test_agent_id_is_case_sensitive() {
        assert_ne!(AgentId::new("Lola"), AgentId::new("LOLA"));
        assert_eq!(AgentId::new("JIM").to_string(), "JIM");
    }
}
