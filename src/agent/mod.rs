// agent/mod.rs - Auction agents

//! Agents: one sequential task per participant.
//!
//! Each agent owns its protocol state machine and a handle to the shared
//! transport. The loop receives with the current state's template, feeds the
//! machine, and sends whatever the machine hands back.

mod buyer_agent;
mod seller_agent;

pub use buyer_agent::{AuctionOutcome, BuyerAgent};
pub use seller_agent::SellerAgent;
