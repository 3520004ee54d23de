// observability/metrics.rs - Auction Metrics

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Configuration for the Prometheus exporter
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Address to expose the scrape endpoint on
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

/// Metric names
pub struct AuctionMetrics;

impl AuctionMetrics {
    pub const MESSAGES_SENT_TOTAL: &'static str = "fipa_auction_messages_sent_total";
    pub const MESSAGES_RECEIVED_TOTAL: &'static str = "fipa_auction_messages_received_total";
    pub const REPLIES_IGNORED_TOTAL: &'static str = "fipa_auction_replies_ignored_total";
    pub const AUCTIONS_COMPLETED_TOTAL: &'static str = "fipa_auction_auctions_completed_total";
}

/// Install the Prometheus recorder and its HTTP listener.
///
/// Needs a running tokio runtime. Without an installed recorder every
/// `record_*` call is a no-op.
pub fn init_metrics(config: MetricsConfig) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()?;
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        AuctionMetrics::MESSAGES_SENT_TOTAL,
        "Messages sent by auction agents, labelled by performative"
    );
    describe_counter!(
        AuctionMetrics::MESSAGES_RECEIVED_TOTAL,
        "Messages accepted by auction agents, labelled by performative"
    );
    describe_counter!(
        AuctionMetrics::REPLIES_IGNORED_TOTAL,
        "Inbound messages dropped without advancing a protocol, labelled by reason"
    );
    describe_counter!(
        AuctionMetrics::AUCTIONS_COMPLETED_TOTAL,
        "Auction rounds closed by the buyer, labelled by outcome"
    );
}

pub fn record_message_sent(performative: &'static str) {
    counter!(AuctionMetrics::MESSAGES_SENT_TOTAL, "performative" => performative).increment(1);
}

pub fn record_message_received(performative: &'static str) {
    counter!(AuctionMetrics::MESSAGES_RECEIVED_TOTAL, "performative" => performative).increment(1);
}

pub fn record_reply_ignored(reason: &'static str) {
    counter!(AuctionMetrics::REPLIES_IGNORED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_auction_completed(awarded: bool) {
    let outcome = if awarded { "awarded" } else { "no_offers" };
    counter!(AuctionMetrics::AUCTIONS_COMPLETED_TOTAL, "outcome" => outcome).increment(1);
}
