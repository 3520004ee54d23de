// protocol/buyer.rs - Buyer side of the one-round auction
//
//! Buyer negotiation state machine.
//!
//! ```text
//! Buyer                         Sellers
//!   |                              |
//!   |---- CALL_FOR_PROPOSALS ----->|  (one broadcast)
//!   |                              |
//!   |<--------- PROPOSE -----------|  (price)
//!   |<--------- REFUSE ------------|  (reason)
//!   |                              |
//!   |---------- ACCEPT ----------->|  (lowest price)
//!   |---------- REJECT ----------->|  (every other proposer)
//! ```
//!
//! States run `Calling -> Waiting -> Deciding -> End` with no cycles.

use super::session::{AuctionSession, Decision, Reply};
use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentId, Performative};
use crate::transport::MessageTemplate;
use tracing::debug;

/// Buyer protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerState {
    Calling,
    Waiting,
    Deciding,
    End,
}

impl BuyerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuyerState::Calling => "calling",
            BuyerState::Waiting => "waiting",
            BuyerState::Deciding => "deciding",
            BuyerState::End => "end",
        }
    }
}

/// Events driving the buyer machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerEvent {
    /// The call for proposals went out
    CfpSent,
    /// A reply was recorded but sellers are still outstanding
    ReplyRecorded,
    /// The last outstanding seller replied
    AllReplied,
    /// Verdicts (possibly none) went out
    VerdictsSent,
}

/// Pure transition function
pub fn buyer_transition(state: BuyerState, event: BuyerEvent) -> Result<BuyerState, ProtocolError> {
    use BuyerEvent::*;
    use BuyerState::*;

    match (state, event) {
        (Calling, CfpSent) => Ok(Waiting),
        (Waiting, ReplyRecorded) => Ok(Waiting),
        (Waiting, AllReplied) => Ok(Deciding),
        (Deciding, VerdictsSent) => Ok(End),
        (from, event) => Err(ProtocolError::InvalidTransition {
            from: from.as_str(),
            event: format!("{:?}", event),
        }),
    }
}

/// Buyer protocol: owns the session for exactly one auction round
#[derive(Debug)]
pub struct BuyerProtocol {
    me: AgentId,
    item: String,
    state: BuyerState,
    session: AuctionSession,
}

impl BuyerProtocol {
    pub fn new(me: AgentId, item: impl Into<String>, session: AuctionSession) -> Self {
        Self {
            me,
            item: item.into(),
            state: BuyerState::Calling,
            session,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.me
    }

    pub fn state(&self) -> BuyerState {
        self.state
    }

    pub fn session(&self) -> &AuctionSession {
        &self.session
    }

    /// Hand the session over once the round is closed
    pub fn into_session(self) -> AuctionSession {
        self.session
    }

    fn apply(&mut self, event: BuyerEvent) -> Result<(), ProtocolError> {
        let next = buyer_transition(self.state, event)?;
        if next != self.state {
            debug!(state = self.state.as_str(), ?event, "Exiting state");
            debug!(state = next.as_str(), from = self.state.as_str(), "Entering state");
            self.state = next;
        }
        Ok(())
    }

    /// Calling: build the one broadcast of the round and move to Waiting.
    ///
    /// An empty roster is already joined, so the machine goes straight
    /// through to Deciding.
    pub fn call_for_proposals(&mut self) -> Result<AclMessage, ProtocolError> {
        if self.state != BuyerState::Calling {
            return Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event: "call_for_proposals".into(),
            });
        }

        let cfp = AclMessage::new(
            Performative::CallForProposals,
            self.me.clone(),
            self.session.expected_sellers().to_vec(),
        )
        .with_content(self.item.clone())
        .with_conversation(self.session.conversation_id());

        self.apply(BuyerEvent::CfpSent)?;
        if self.session.all_replied() {
            self.apply(BuyerEvent::AllReplied)?;
        }
        Ok(cfp)
    }

    /// Waiting: record one reply.
    ///
    /// Ignorable errors leave both the session and the state unchanged.
    pub fn handle_reply(&mut self, msg: &AclMessage) -> Result<Reply, ProtocolError> {
        if self.state != BuyerState::Waiting {
            return Err(ProtocolError::ProtocolViolation {
                state: self.state.as_str(),
                performative: msg.performative,
                sender: msg.sender.clone(),
            });
        }
        if msg.conversation_id.as_deref() != Some(self.session.conversation_id()) {
            return Err(ProtocolError::ProtocolViolation {
                state: self.state.as_str(),
                performative: msg.performative,
                sender: msg.sender.clone(),
            });
        }

        let reply = self.session.record(msg)?;
        if self.session.all_replied() {
            self.apply(BuyerEvent::AllReplied)?;
        } else {
            self.apply(BuyerEvent::ReplyRecorded)?;
        }
        Ok(reply)
    }

    /// Deciding: compute the winner and the verdict messages.
    ///
    /// The machine stays in Deciding until [`BuyerProtocol::verdicts_sent`].
    pub fn decide(&mut self) -> Result<(Decision, Vec<AclMessage>), ProtocolError> {
        if self.state != BuyerState::Deciding {
            return Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event: "decide".into(),
            });
        }

        let decision = self.session.decide()?;
        let conversation_id = self.session.conversation_id().to_string();
        let messages = decision
            .verdicts
            .iter()
            .map(|v| {
                AclMessage::new(v.performative(), self.me.clone(), vec![v.seller.clone()])
                    .with_content(v.price.to_string())
                    .with_conversation(conversation_id.clone())
            })
            .collect();

        Ok((decision, messages))
    }

    /// Close the round once verdicts are out
    pub fn verdicts_sent(&mut self) -> Result<(), ProtocolError> {
        if !self.session.is_decided() {
            return Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event: "verdicts_sent".into(),
            });
        }
        self.apply(BuyerEvent::VerdictsSent)
    }
}

impl ProtocolStateMachine for BuyerProtocol {
    fn role(&self) -> Role {
        Role::Initiator
    }

    fn state_name(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_complete(&self) -> bool {
        self.state == BuyerState::End
    }

    fn expected_performatives(&self) -> Vec<Performative> {
        match self.state {
            BuyerState::Waiting => vec![Performative::Propose, Performative::Refuse],
            _ => vec![],
        }
    }

    fn receive_template(&self) -> Option<MessageTemplate> {
        match self.state {
            BuyerState::Waiting => Some(
                MessageTemplate::match_performatives(self.expected_performatives())
                    .and(MessageTemplate::match_senders(
                        self.session.expected_sellers().iter().cloned(),
                    ))
                    .and(MessageTemplate::match_conversation(
                        self.session.conversation_id(),
                    )),
            ),
            _ => None,
        }
    }
}
