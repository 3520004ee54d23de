// protocol/mod.rs - Auction protocol state machines

//! Buyer and seller state machines for the one-round procurement auction.
//!
//! - `BuyerProtocol` - broadcasts the call, joins on every reply, decides
//! - `SellerProtocol` - quotes or refuses, then learns the verdict
//! - `AuctionSession` - buyer-owned record of one round
//!
//! Both machines are a state enum plus a pure transition function. They
//! never touch the transport; the agents in [`crate::agent`] drive them.
//!
//! # Example
//!
//! ```
//! use fipa_auction::acl_message::{AgentId, Performative};
//! use fipa_auction::protocol::*;
//!
//! let session = AuctionSession::new("conv-1", [AgentId::new("LULU")]);
//! let mut buyer = BuyerProtocol::new(AgentId::new("JACK"), "Looking for a bike", session);
//! let mut seller = SellerProtocol::new(
//!     AgentId::new("LULU"),
//!     AgentId::new("JACK"),
//!     SellerStock::priced(2400),
//! );
//!
//! let cfp = buyer.call_for_proposals().unwrap();
//! let quote = seller.handle(&cfp).unwrap().reply.unwrap();
//! buyer.handle_reply(&quote).unwrap();
//!
//! let (decision, verdicts) = buyer.decide().unwrap();
//! assert_eq!(decision.winner.unwrap().price, 2400);
//! assert_eq!(verdicts[0].performative, Performative::Accept);
//! ```

mod buyer;
mod seller;
mod session;
mod state_machine;

pub use buyer::{buyer_transition, BuyerEvent, BuyerProtocol, BuyerState};
pub use seller::{
    seller_transition, SellerEvent, SellerOutcome, SellerProtocol, SellerState, SellerStep,
    SellerStock, NO_STOCK_REASON,
};
pub use session::{lowest_offer, AuctionSession, Decision, Offer, Refusal, Reply, Verdict};
pub use state_machine::{ProtocolError, ProtocolStateMachine, Role};
