// runner.rs - Wire up one auction on a local bus

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::acl_message::AgentId;
use crate::agent::{AuctionOutcome, BuyerAgent, SellerAgent};
use crate::config::{AuctionConfig, ConfigError};
use crate::protocol::{AuctionSession, BuyerProtocol, ProtocolError, SellerOutcome, SellerProtocol};
use crate::transport::{LocalBus, MessageTransport, TransportError};

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The round was aborted; `sellers` records where each seller stopped
    #[error("Buyer failed: {source}")]
    Buyer {
        #[source]
        source: ProtocolError,
        sellers: Vec<SellerReport>,
    },

    #[error("Agent task panicked: {0}")]
    Join(String),
}

/// How one seller's run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerReport {
    pub seller: AgentId,
    /// `None` when the seller never reached a terminal state
    pub outcome: Option<SellerOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything observed during one auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionReport {
    pub buyer: AgentId,
    pub item: String,
    pub outcome: AuctionOutcome,
    /// In roster order
    pub sellers: Vec<SellerReport>,
}

impl AuctionReport {
    pub fn seller(&self, name: &str) -> Option<&SellerReport> {
        self.sellers.iter().find(|s| s.seller.as_str() == name)
    }
}

/// Runs one buyer and its sellers as independent tasks on a [`LocalBus`]
pub struct AuctionRunner {
    config: AuctionConfig,
    bus: Arc<LocalBus>,
}

impl AuctionRunner {
    pub fn new(config: AuctionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            bus: Arc::new(LocalBus::new()),
        })
    }

    /// The bus the agents talk over
    pub fn bus(&self) -> Arc<LocalBus> {
        self.bus.clone()
    }

    /// Run the round to completion.
    ///
    /// Sellers still blocked once the buyer is done are released by closing
    /// the bus and reported without an outcome. When the buyer fails, those
    /// reports travel in [`RunnerError::Buyer`].
    #[instrument(skip(self), fields(buyer = %self.config.buyer))]
    pub async fn run(self) -> Result<AuctionReport, RunnerError> {
        let buyer_id = self.config.buyer_id();
        self.bus.register(&buyer_id)?;
        for seller in &self.config.sellers {
            self.bus.register(&seller.agent_id())?;
        }

        let seller_tasks: Vec<_> = self
            .config
            .sellers
            .iter()
            .map(|seller| {
                let protocol = SellerProtocol::new(seller.agent_id(), buyer_id.clone(), seller.stock());
                let agent = SellerAgent::new(protocol, self.bus.clone())
                    .with_reply_delay(seller.reply_delay());
                (seller.agent_id(), tokio::spawn(agent.run()))
            })
            .collect();

        let conversation_id = self
            .config
            .conversation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(
            conversation = %conversation_id,
            sellers = self.config.sellers.len(),
            "Starting auction"
        );

        let session = AuctionSession::new(conversation_id, self.config.seller_ids());
        let protocol = BuyerProtocol::new(buyer_id.clone(), self.config.item.clone(), session);
        let buyer = BuyerAgent::new(protocol, self.bus.clone())
            .with_reply_timeout(self.config.reply_timeout());

        let buyer_result = tokio::spawn(buyer.run())
            .await
            .map_err(|e| RunnerError::Join(e.to_string()))?;

        // Verdicts are already queued; closing only releases sellers left waiting
        self.bus.close();

        let (names, handles): (Vec<_>, Vec<_>) = seller_tasks.into_iter().unzip();
        let mut sellers = Vec::with_capacity(names.len());
        for (seller, joined) in names.into_iter().zip(join_all(handles).await) {
            let report = match joined {
                Ok(Ok(outcome)) => SellerReport {
                    seller,
                    outcome: Some(outcome),
                    error: None,
                },
                Ok(Err(e)) => SellerReport {
                    seller,
                    outcome: None,
                    error: Some(e.to_string()),
                },
                Err(e) => return Err(RunnerError::Join(e.to_string())),
            };
            sellers.push(report);
        }

        let outcome = match buyer_result {
            Ok(outcome) => outcome,
            Err(source) => {
                error!(error = %source, "Auction aborted");
                return Err(RunnerError::Buyer { source, sellers });
            }
        };

        Ok(AuctionReport {
            buyer: buyer_id,
            item: self.config.item,
            outcome,
            sellers,
        })
    }
}
