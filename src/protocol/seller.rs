// protocol/seller.rs - Seller side of the one-round auction

use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentId, Performative};
use crate::transport::MessageTemplate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reason sent with every refusal
pub const NO_STOCK_REASON: &str = "no stock";

/// Seller protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerState {
    Waiting,
    Proposing,
    Refusing,
    Winning,
    Losing,
}

impl SellerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerState::Waiting => "waiting",
            SellerState::Proposing => "proposing",
            SellerState::Refusing => "refusing",
            SellerState::Winning => "winning",
            SellerState::Losing => "losing",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SellerState::Refusing | SellerState::Winning | SellerState::Losing
        )
    }
}

/// Events driving the seller machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerEvent {
    Proposed,
    Refused,
    Accepted,
    Rejected,
}

/// Pure transition function
pub fn seller_transition(state: SellerState, event: SellerEvent) -> Result<SellerState, ProtocolError> {
    use SellerEvent::*;
    use SellerState::*;

    match (state, event) {
        (Waiting, Proposed) => Ok(Proposing),
        (Waiting, Refused) => Ok(Refusing),
        (Proposing, Accepted) => Ok(Winning),
        (Proposing, Rejected) => Ok(Losing),
        (from, event) => Err(ProtocolError::InvalidTransition {
            from: from.as_str(),
            event: format!("{:?}", event),
        }),
    }
}

/// Fixed stock of one seller for the whole auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerStock {
    pub ask_price: Option<u64>,
    pub has_stock: bool,
}

impl SellerStock {
    pub fn priced(ask_price: u64) -> Self {
        Self {
            ask_price: Some(ask_price),
            has_stock: true,
        }
    }

    pub fn out_of_stock() -> Self {
        Self {
            ask_price: None,
            has_stock: false,
        }
    }

    /// Absent or negative price means no stock
    pub fn from_price(price: Option<i64>) -> Self {
        match price {
            Some(p) if p >= 0 => Self::priced(p as u64),
            _ => Self::out_of_stock(),
        }
    }

    /// Price to quote, if this seller will propose at all
    pub fn quote(&self) -> Option<u64> {
        if self.has_stock { self.ask_price } else { None }
    }
}

/// Terminal observation of one seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SellerOutcome {
    Won { price: u64 },
    Lost { price: u64 },
    Refused { reason: String },
}

/// Result of handling one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerStep {
    /// Message to send back, if any
    pub reply: Option<AclMessage>,
    /// Set once the machine reached a terminal state
    pub outcome: Option<SellerOutcome>,
}

/// Seller protocol for one seller and one auction
#[derive(Debug)]
pub struct SellerProtocol {
    me: AgentId,
    buyer: AgentId,
    stock: SellerStock,
    state: SellerState,
    /// Learned from the call for proposals
    conversation_id: Option<String>,
}

impl SellerProtocol {
    pub fn new(me: AgentId, buyer: AgentId, stock: SellerStock) -> Self {
        Self {
            me,
            buyer,
            stock,
            state: SellerState::Waiting,
            conversation_id: None,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.me
    }

    pub fn state(&self) -> SellerState {
        self.state
    }

    fn apply(&mut self, event: SellerEvent) -> Result<(), ProtocolError> {
        let next = seller_transition(self.state, event)?;
        debug!(state = self.state.as_str(), ?event, "Exiting state");
        debug!(state = next.as_str(), from = self.state.as_str(), "Entering state");
        self.state = next;
        Ok(())
    }

    fn violation(&self, msg: &AclMessage) -> ProtocolError {
        ProtocolError::ProtocolViolation {
            state: self.state.as_str(),
            performative: msg.performative,
            sender: msg.sender.clone(),
        }
    }

    /// Handle one inbound message.
    ///
    /// Anything the current state does not expect is an ignorable
    /// violation and leaves the machine where it was.
    pub fn handle(&mut self, msg: &AclMessage) -> Result<SellerStep, ProtocolError> {
        if msg.sender != self.buyer {
            return Err(ProtocolError::UnknownSender(msg.sender.clone()));
        }

        match (self.state, msg.performative) {
            (SellerState::Waiting, Performative::CallForProposals) => {
                self.conversation_id = msg.conversation_id.clone();
                match self.stock.quote() {
                    Some(price) => {
                        let reply = msg
                            .create_reply(self.me.clone(), Performative::Propose)
                            .with_content(price.to_string());
                        self.apply(SellerEvent::Proposed)?;
                        Ok(SellerStep {
                            reply: Some(reply),
                            outcome: None,
                        })
                    }
                    None => {
                        let reply = msg
                            .create_reply(self.me.clone(), Performative::Refuse)
                            .with_content(NO_STOCK_REASON);
                        self.apply(SellerEvent::Refused)?;
                        Ok(SellerStep {
                            reply: Some(reply),
                            outcome: Some(SellerOutcome::Refused {
                                reason: NO_STOCK_REASON.to_string(),
                            }),
                        })
                    }
                }
            }
            (SellerState::Proposing, Performative::Accept | Performative::Reject) => {
                if msg.conversation_id != self.conversation_id {
                    return Err(self.violation(msg));
                }
                let price = msg.price().map_err(|source| ProtocolError::MalformedPrice {
                    sender: msg.sender.clone(),
                    source,
                })?;

                let outcome = if msg.performative == Performative::Accept {
                    self.apply(SellerEvent::Accepted)?;
                    SellerOutcome::Won { price }
                } else {
                    self.apply(SellerEvent::Rejected)?;
                    SellerOutcome::Lost { price }
                };
                Ok(SellerStep {
                    reply: None,
                    outcome: Some(outcome),
                })
            }
            _ => Err(self.violation(msg)),
        }
    }
}

impl ProtocolStateMachine for SellerProtocol {
    fn role(&self) -> Role {
        Role::Participant
    }

    fn state_name(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }

    fn expected_performatives(&self) -> Vec<Performative> {
        match self.state {
            SellerState::Waiting => vec![Performative::CallForProposals],
            SellerState::Proposing => vec![Performative::Accept, Performative::Reject],
            _ => vec![],
        }
    }

    fn receive_template(&self) -> Option<MessageTemplate> {
        let from_buyer = MessageTemplate::match_sender(self.buyer.clone());
        match self.state {
            SellerState::Waiting => Some(
                MessageTemplate::match_performative(Performative::CallForProposals).and(from_buyer),
            ),
            SellerState::Proposing => {
                let verdict = MessageTemplate::match_performatives(self.expected_performatives())
                    .and(from_buyer);
                Some(match &self.conversation_id {
                    Some(c) => verdict.and(MessageTemplate::match_conversation(c.clone())),
                    None => verdict,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> AgentId {
        AgentId::new(name)
    }

    fn cfp() -> AclMessage {
        AclMessage::new(Performative::CallForProposals, id("JACK"), vec![id("LULU")])
            .with_content("Looking for a bike")
            .with_conversation("conv-1")
    }

    fn verdict(performative: Performative, content: &str) -> AclMessage {
        AclMessage::new(performative, id("JACK"), vec![id("LULU")])
            .with_content(content)
            .with_conversation("conv-1")
    }

    #[test]
    fn test_transition_table() {
        use SellerEvent::*;
        use SellerState::*;

        assert_eq!(seller_transition(Waiting, Proposed), Ok(Proposing));
        assert_eq!(seller_transition(Waiting, Refused), Ok(Refusing));
        assert_eq!(seller_transition(Proposing, Accepted), Ok(Winning));
        assert_eq!(seller_transition(Proposing, Rejected), Ok(Losing));
        assert!(seller_transition(Refusing, Accepted).is_err());
        assert!(seller_transition(Winning, Proposed).is_err());
        assert!(seller_transition(Waiting, Accepted).is_err());
    }

    #[test]
    fn test_stock_from_price() {
        assert_eq!(SellerStock::from_price(Some(2400)).quote(), Some(2400));
        assert_eq!(SellerStock::from_price(Some(0)).quote(), Some(0));
        assert_eq!(SellerStock::from_price(Some(-1)), SellerStock::out_of_stock());
        assert_eq!(SellerStock::from_price(None).quote(), None);

        let no_stock_with_price = SellerStock {
            ask_price: Some(10),
            has_stock: false,
        };
        assert_eq!(no_stock_with_price.quote(), None);
    }

    #[test]
    fn test_propose_then_win() {
        let mut seller = SellerProtocol::new(id("LULU"), id("JACK"), SellerStock::priced(2400));

        let step = seller.handle(&cfp()).unwrap();
        let reply = step.reply.unwrap();
        assert_eq!(reply.performative, Performative::Propose);
        assert_eq!(reply.content, "2400");
        assert_eq!(reply.receivers, vec![id("JACK")]);
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(seller.state(), SellerState::Proposing);

        let step = seller.handle(&verdict(Performative::Accept, "2400")).unwrap();
        assert!(step.reply.is_none());
        assert_eq!(step.outcome, Some(SellerOutcome::Won { price: 2400 }));
        assert!(seller.is_complete());
    }

    #[test]
    fn test_propose_then_lose() {
        let mut seller = SellerProtocol::new(id("LILI"), id("JACK"), SellerStock::priced(2700));
        seller.handle(&cfp()).unwrap();
        let step = seller.handle(&verdict(Performative::Reject, "2700")).unwrap();
        assert_eq!(step.outcome, Some(SellerOutcome::Lost { price: 2700 }));
        assert_eq!(seller.state(), SellerState::Losing);
    }

    #[test]
    fn test_no_stock_refuses_and_terminates() {
        let mut seller = SellerProtocol::new(id("JIM"), id("JACK"), SellerStock::from_price(Some(-1)));
        let step = seller.handle(&cfp()).unwrap();
        let reply = step.reply.unwrap();
        assert_eq!(reply.performative, Performative::Refuse);
        assert_eq!(reply.content, NO_STOCK_REASON);
        assert_eq!(seller.state(), SellerState::Refusing);
        assert!(seller.is_complete());
        assert!(seller.receive_template().is_none());

        let late = seller.handle(&verdict(Performative::Accept, "1")).unwrap_err();
        assert!(late.is_ignorable());
    }

    #[test]
    fn test_unexpected_messages_are_ignored() {
        let mut seller = SellerProtocol::new(id("LULU"), id("JACK"), SellerStock::priced(2400));

        let early_verdict = seller.handle(&verdict(Performative::Accept, "2400")).unwrap_err();
        assert!(matches!(early_verdict, ProtocolError::ProtocolViolation { .. }));

        let impostor = AclMessage::new(Performative::CallForProposals, id("EVE"), vec![id("LULU")]);
        assert!(matches!(
            seller.handle(&impostor),
            Err(ProtocolError::UnknownSender(_))
        ));
        assert_eq!(seller.state(), SellerState::Waiting);

        seller.handle(&cfp()).unwrap();
        assert!(matches!(
            seller.handle(&cfp()),
            Err(ProtocolError::ProtocolViolation { .. })
        ));

        let garbage = seller.handle(&verdict(Performative::Accept, "lots")).unwrap_err();
        assert!(matches!(garbage, ProtocolError::MalformedPrice { .. }));

        let other_round = verdict(Performative::Accept, "2400").with_conversation("conv-2");
        assert!(seller.handle(&other_round).unwrap_err().is_ignorable());
        assert_eq!(seller.state(), SellerState::Proposing);
    }

    #[test]
    fn test_ignored_message_logs_no_transition() {
        let mut seller = SellerProtocol::new(id("LULU"), id("JACK"), SellerStock::priced(2400));
        let logs = crate::observability::capture_logs(|| {
            seller.handle(&verdict(Performative::Reject, "2400")).unwrap_err();
            seller.handle(&cfp()).unwrap();
            seller.handle(&verdict(Performative::Reject, "2400")).unwrap();
        });

        assert_eq!(logs.matches("Exiting state").count(), 2);
        assert_eq!(logs.matches("Entering state").count(), 2);
        assert!(logs.contains("losing"));
    }

    #[test]
    fn test_templates_follow_state() {
        let mut seller = SellerProtocol::new(id("LULU"), id("JACK"), SellerStock::priced(1));
        let waiting = seller.receive_template().unwrap();
        assert!(waiting.matches(&cfp()));
        assert!(!waiting.matches(&verdict(Performative::Accept, "1")));

        seller.handle(&cfp()).unwrap();
        let proposing = seller.receive_template().unwrap();
        assert!(proposing.matches(&verdict(Performative::Reject, "1")));
        assert!(!proposing.matches(&cfp()));
        assert!(!proposing.matches(&verdict(Performative::Accept, "1").with_conversation("x")));
    }
}
