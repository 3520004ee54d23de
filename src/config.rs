// config.rs - Auction configuration

//! Auction configuration.
//!
//! Sources, lowest priority first: built-in default scenario, an optional
//! TOML/JSON/YAML file, then `FIPA_AUCTION__*` environment variables
//! (e.g. `FIPA_AUCTION__ITEM`, `FIPA_AUCTION__REPLY_TIMEOUT_MS`).

use crate::acl_message::AgentId;
use crate::protocol::SellerStock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "FIPA_AUCTION";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No sellers configured")]
    NoSellers,

    #[error("Agent name must not be empty")]
    EmptyName,

    #[error("Seller listed twice: {0}")]
    DuplicateSeller(String),

    #[error("Buyer {0} is also listed as a seller")]
    BuyerIsSeller(String),

    #[error("Invalid seller entry {0:?}, expected NAME=PRICE")]
    InvalidSellerEntry(String),
}

/// One seller entry. A missing or negative price means no stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerConfig {
    pub name: String,
    #[serde(default)]
    pub price: Option<i64>,
    /// Simulated latency before answering the call for proposals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_delay_ms: Option<u64>,
}

impl SellerConfig {
    pub fn new(name: impl Into<String>, price: Option<i64>) -> Self {
        Self {
            name: name.into(),
            price,
            reply_delay_ms: None,
        }
    }

    pub fn with_reply_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reply_delay_ms = Some(delay_ms);
        self
    }

    pub fn reply_delay(&self) -> Option<Duration> {
        self.reply_delay_ms.map(Duration::from_millis)
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::new(self.name.clone())
    }

    pub fn stock(&self) -> SellerStock {
        SellerStock::from_price(self.price)
    }
}

impl std::str::FromStr for SellerConfig {
    type Err = ConfigError;

    /// Parse `NAME=PRICE`; `PRICE` may be `none` or negative for no stock
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, price) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidSellerEntry(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidSellerEntry(s.to_string()));
        }
        let price = match price.trim() {
            "" | "none" | "-" => None,
            p => Some(
                p.parse::<i64>()
                    .map_err(|_| ConfigError::InvalidSellerEntry(s.to_string()))?,
            ),
        };
        Ok(Self::new(name, price))
    }
}

/// Everything needed to run one auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    pub buyer: String,
    /// Content of the call for proposals
    pub item: String,
    /// Roster in broadcast order
    pub sellers: Vec<SellerConfig>,
    /// How long the buyer waits for every reply after its call; absent waits forever
    pub reply_timeout_ms: Option<u64>,
    /// Fixed conversation id; a random one is used when absent
    pub conversation_id: Option<String>,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            buyer: "JACK".into(),
            item: "Looking for a bike".into(),
            sellers: vec![
                SellerConfig::new("Lola", Some(2800)),
                SellerConfig::new("LILI", Some(2700)),
                SellerConfig::new("JIM", Some(-1)),
                SellerConfig::new("LULU", Some(2400)),
            ],
            reply_timeout_ms: None,
            conversation_id: None,
        }
    }
}

impl AuctionConfig {
    /// Load from an optional file plus the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`AuctionConfig::load`], reading variables from `vars` instead of
    /// the process environment when given
    fn load_with_env(
        path: Option<&Path>,
        vars: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(vars);
        let loaded: AuctionConfig = builder.add_source(env).build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buyer.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.sellers.is_empty() {
            return Err(ConfigError::NoSellers);
        }

        let mut seen = HashSet::new();
        for seller in &self.sellers {
            if seller.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if seller.name == self.buyer {
                return Err(ConfigError::BuyerIsSeller(seller.name.clone()));
            }
            if !seen.insert(seller.name.as_str()) {
                return Err(ConfigError::DuplicateSeller(seller.name.clone()));
            }
        }
        Ok(())
    }

    pub fn buyer_id(&self) -> AgentId {
        AgentId::new(self.buyer.clone())
    }

    pub fn seller_ids(&self) -> Vec<AgentId> {
        self.sellers.iter().map(SellerConfig::agent_id).collect()
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}
