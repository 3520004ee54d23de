// protocol/session.rs - Buyer-owned auction session

use super::state_machine::ProtocolError;
use crate::acl_message::{AclMessage, AgentId, Performative};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Price quote from a seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub seller: AgentId,
    pub price: u64,
}

/// Recorded refusal and its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refusal {
    pub seller: AgentId,
    pub reason: String,
}

/// What a recorded reply turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Offer(Offer),
    Refusal(Refusal),
}

/// Verdict for one proposer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub seller: AgentId,
    /// The seller's own proposed price, echoed back as content
    pub price: u64,
    pub accepted: bool,
}

impl Verdict {
    pub fn performative(&self) -> Performative {
        if self.accepted {
            Performative::Accept
        } else {
            Performative::Reject
        }
    }
}

/// Result of the decision step
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Decision {
    pub winner: Option<Offer>,
    /// One entry per recorded offer, in recording order
    pub verdicts: Vec<Verdict>,
}

/// Per-seller outcomes of one auction round.
///
/// Every seller in the roster ends up in at most one of `offers` and
/// `refusals`. Offers keep recording order, which is the tie-break order.
#[derive(Debug, Clone)]
pub struct AuctionSession {
    conversation_id: String,
    expected: Vec<AgentId>,
    expected_set: HashSet<AgentId>,
    replied: HashSet<AgentId>,
    offers: Vec<Offer>,
    refusals: Vec<Refusal>,
    winner: Option<Offer>,
    decided: bool,
}

impl AuctionSession {
    /// Create a session for the given roster. Repeated names collapse into one seller.
    pub fn new(conversation_id: impl Into<String>, sellers: impl IntoIterator<Item = AgentId>) -> Self {
        let mut expected = Vec::new();
        let mut expected_set = HashSet::new();
        for seller in sellers {
            if expected_set.insert(seller.clone()) {
                expected.push(seller);
            }
        }

        Self {
            conversation_id: conversation_id.into(),
            expected,
            expected_set,
            replied: HashSet::new(),
            offers: Vec::new(),
            refusals: Vec::new(),
            winner: None,
            decided: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Roster in configuration order
    pub fn expected_sellers(&self) -> &[AgentId] {
        &self.expected
    }

    pub fn is_expected(&self, seller: &AgentId) -> bool {
        self.expected_set.contains(seller)
    }

    pub fn has_replied(&self, seller: &AgentId) -> bool {
        self.replied.contains(seller)
    }

    /// Number of distinct sellers whose reply was recorded
    pub fn reply_count(&self) -> usize {
        self.replied.len()
    }

    /// Join condition: every expected seller has replied
    pub fn all_replied(&self) -> bool {
        self.replied.len() == self.expected.len()
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn refusals(&self) -> &[Refusal] {
        &self.refusals
    }

    pub fn winner(&self) -> Option<&Offer> {
        self.winner.as_ref()
    }

    pub fn is_decided(&self) -> bool {
        self.decided
    }

    fn admit(&self, seller: &AgentId) -> Result<(), ProtocolError> {
        if self.decided {
            return Err(ProtocolError::SessionClosed);
        }
        if !self.is_expected(seller) {
            return Err(ProtocolError::UnknownSender(seller.clone()));
        }
        if self.has_replied(seller) {
            return Err(ProtocolError::DuplicateReply(seller.clone()));
        }
        Ok(())
    }

    pub fn record_offer(&mut self, seller: AgentId, price: u64) -> Result<(), ProtocolError> {
        self.admit(&seller)?;
        self.replied.insert(seller.clone());
        self.offers.push(Offer { seller, price });
        Ok(())
    }

    pub fn record_refusal(
        &mut self,
        seller: AgentId,
        reason: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.admit(&seller)?;
        self.replied.insert(seller.clone());
        self.refusals.push(Refusal {
            seller,
            reason: reason.into(),
        });
        Ok(())
    }

    /// Record a PROPOSE or REFUSE message.
    ///
    /// Rejected messages leave the session untouched.
    pub fn record(&mut self, msg: &AclMessage) -> Result<Reply, ProtocolError> {
        match msg.performative {
            Performative::Propose => {
                self.admit(&msg.sender)?;
                let price = msg.price().map_err(|source| ProtocolError::MalformedPrice {
                    sender: msg.sender.clone(),
                    source,
                })?;
                self.record_offer(msg.sender.clone(), price)?;
                Ok(Reply::Offer(Offer {
                    seller: msg.sender.clone(),
                    price,
                }))
            }
            Performative::Refuse => {
                self.record_refusal(msg.sender.clone(), msg.content.clone())?;
                Ok(Reply::Refusal(Refusal {
                    seller: msg.sender.clone(),
                    reason: msg.content.clone(),
                }))
            }
            performative => Err(ProtocolError::ProtocolViolation {
                state: "waiting",
                performative,
                sender: msg.sender.clone(),
            }),
        }
    }

    /// Pick the winner and the verdict for every proposer. Runs at most once.
    pub fn decide(&mut self) -> Result<Decision, ProtocolError> {
        if self.decided {
            return Err(ProtocolError::SessionClosed);
        }
        self.decided = true;

        let winner = lowest_offer(&self.offers).cloned();
        self.winner = winner.clone();

        let verdicts = match &winner {
            Some(best) => self
                .offers
                .iter()
                .map(|offer| Verdict {
                    seller: offer.seller.clone(),
                    price: offer.price,
                    accepted: offer.seller == best.seller,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Decision { winner, verdicts })
    }
}

/// Strictly lowest price; on a tie the earliest offer keeps priority.
pub fn lowest_offer(offers: &[Offer]) -> Option<&Offer> {
    let mut best: Option<&Offer> = None;
    for offer in offers {
        if best.is_none_or(|b| offer.price < b.price) {
            best = Some(offer);
        }
    }
    best
}
