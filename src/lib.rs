// lib.rs - FIPA One-Round Procurement Auction
//
// A buyer agent and N seller agents negotiate one call-for-proposals round
// over typed ACL messages.

#![doc = include_str!("../README.md")]

pub mod acl_message;
pub mod agent;
pub mod config;
pub mod observability;
pub mod protocol;
pub mod runner;
pub mod transport;

// Re-export commonly used types
pub use acl_message::{AclMessage, AgentId, Performative};

pub use agent::{AuctionOutcome, BuyerAgent, SellerAgent};

pub use config::{AuctionConfig, ConfigError, SellerConfig};

pub use protocol::{
    AuctionSession, BuyerProtocol, BuyerState, Decision, Offer, ProtocolError,
    ProtocolStateMachine, Role, SellerOutcome, SellerProtocol, SellerState, SellerStock, Verdict,
};

pub use runner::{AuctionReport, AuctionRunner, RunnerError, SellerReport};

pub use transport::{LocalBus, MessageTemplate, MessageTransport, TransportError};

pub use observability::{init_metrics, init_tracing, MetricsConfig, TracingConfig, TracingFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::acl_message::{AclMessage, AgentId, Performative};
    pub use crate::agent::{AuctionOutcome, BuyerAgent, SellerAgent};
    pub use crate::config::AuctionConfig;
    pub use crate::protocol::{
        AuctionSession, BuyerProtocol, ProtocolError, ProtocolStateMachine, SellerOutcome,
        SellerProtocol, SellerStock,
    };
    pub use crate::runner::{AuctionReport, AuctionRunner};
    pub use crate::transport::{LocalBus, MessageTemplate, MessageTransport};
}
