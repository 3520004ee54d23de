// agent/seller_agent.rs - Seller dispatch loop

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::observability::{record_message_received, record_message_sent, record_reply_ignored};
use crate::protocol::{ProtocolError, ProtocolStateMachine, SellerOutcome, SellerProtocol};
use crate::transport::MessageTransport;

/// Drives a [`SellerProtocol`] over a transport
pub struct SellerAgent<T: MessageTransport + ?Sized> {
    protocol: SellerProtocol,
    transport: Arc<T>,
    reply_delay: Option<Duration>,
}

impl<T: MessageTransport + ?Sized> SellerAgent<T> {
    pub fn new(protocol: SellerProtocol, transport: Arc<T>) -> Self {
        Self {
            protocol,
            transport,
            reply_delay: None,
        }
    }

    /// Hold each answer to the call for proposals back by `delay`
    pub fn with_reply_delay(mut self, delay: Option<Duration>) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Run until a terminal state. Never re-enters Waiting.
    #[instrument(skip(self), fields(agent = %self.protocol.agent_id(), role = ?self.protocol.role()))]
    pub async fn run(mut self) -> Result<SellerOutcome, ProtocolError> {
        debug!(state = self.protocol.state_name(), "Entering state");
        loop {
            let Some(template) = self.protocol.receive_template() else {
                return Err(ProtocolError::InvalidTransition {
                    from: self.protocol.state_name(),
                    event: "receive".into(),
                });
            };

            let msg = self
                .transport
                .receive(self.protocol.agent_id(), &template, None)
                .await?;
            debug!(
                performative = %msg.performative,
                from = %msg.sender,
                content = %msg.content,
                "Received message"
            );

            let step = match self.protocol.handle(&msg) {
                Ok(step) => step,
                Err(e) if e.is_ignorable() => {
                    record_reply_ignored(e.kind());
                    warn!(sender = %msg.sender, error = %e, "Ignoring message");
                    continue;
                }
                Err(e) => return Err(e),
            };
            record_message_received(msg.performative.as_str());

            if let Some(reply) = step.reply {
                if let Some(delay) = self.reply_delay {
                    tokio::time::sleep(delay).await;
                }
                info!(
                    performative = %reply.performative,
                    content = %reply.content,
                    "Answering call for proposals"
                );
                let performative = reply.performative;
                self.transport.send(reply).await?;
                record_message_sent(performative.as_str());
            }

            if let Some(outcome) = step.outcome {
                match &outcome {
                    SellerOutcome::Won { price } => info!(price, "Won the auction"),
                    SellerOutcome::Lost { price } => info!(price, "Lost the auction"),
                    SellerOutcome::Refused { reason } => info!(%reason, "Out of stock"),
                }
                return Ok(outcome);
            }
        }
    }
}
