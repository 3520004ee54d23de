// agent/buyer_agent.rs - Buyer dispatch loop

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::acl_message::{AgentId, Performative};
use crate::observability::{
    record_auction_completed, record_message_received, record_message_sent, record_reply_ignored,
};
use crate::protocol::{
    AuctionSession, BuyerProtocol, BuyerState, Offer, ProtocolError, ProtocolStateMachine,
    Refusal, Reply,
};
use crate::transport::{broadcast, send_to, MessageTransport, TransportError};

/// Final record of one closed auction round
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AuctionOutcome {
    pub conversation_id: String,
    pub winner: Option<Offer>,
    /// In recording order
    pub offers: Vec<Offer>,
    pub refusals: Vec<Refusal>,
    pub verdicts_sent: usize,
}

impl AuctionOutcome {
    fn from_session(session: AuctionSession, verdicts_sent: usize) -> Self {
        Self {
            conversation_id: session.conversation_id().to_string(),
            winner: session.winner().cloned(),
            offers: session.offers().to_vec(),
            refusals: session.refusals().to_vec(),
            verdicts_sent,
        }
    }
}

/// Drives a [`BuyerProtocol`] over a transport.
pub struct BuyerAgent<T: MessageTransport + ?Sized> {
    protocol: BuyerProtocol,
    transport: Arc<T>,
    reply_timeout: Option<Duration>,
}

impl<T: MessageTransport + ?Sized> BuyerAgent<T> {
    pub fn new(protocol: BuyerProtocol, transport: Arc<T>) -> Self {
        Self {
            protocol,
            transport,
            reply_timeout: None,
        }
    }

    /// Give up on the round when not every seller replied within `timeout`
    /// of the call for proposals
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    fn id(&self) -> &AgentId {
        self.protocol.agent_id()
    }

    /// Run the round to completion.
    ///
    /// Returns once the session is closed. Without a reply timeout a
    /// seller that never answers keeps this pending forever.
    #[instrument(skip(self), fields(agent = %self.protocol.agent_id(), role = ?self.protocol.role()))]
    pub async fn run(mut self) -> Result<AuctionOutcome, ProtocolError> {
        let mut verdicts_sent = 0;
        let mut deadline = None;
        debug!(state = self.protocol.state_name(), "Entering state");

        loop {
            match self.protocol.state() {
                BuyerState::Calling => {
                    let cfp = self.protocol.call_for_proposals()?;
                    deadline = self.reply_timeout.map(|limit| Instant::now() + limit);
                    if cfp.receivers.is_empty() {
                        warn!("Empty roster, skipping call for proposals");
                        continue;
                    }
                    info!(
                        receivers = cfp.receivers.len(),
                        content = %cfp.content,
                        "Broadcasting call for proposals"
                    );
                    broadcast(
                        &*self.transport,
                        self.protocol.agent_id(),
                        cfp.performative,
                        &cfp.receivers,
                        cfp.content,
                        self.protocol.session().conversation_id(),
                    )
                    .await?;
                    record_message_sent(Performative::CallForProposals.as_str());
                }
                BuyerState::Waiting => self.wait_for_reply(deadline).await?,
                BuyerState::Deciding => {
                    let (decision, messages) = self.protocol.decide()?;
                    match &decision.winner {
                        Some(best) => info!(winner = %best.seller, price = best.price, "Winner selected"),
                        None => info!("No offers received, nobody wins"),
                    }
                    let conversation_id = self.protocol.session().conversation_id();
                    for msg in messages {
                        for receiver in &msg.receivers {
                            debug!(
                                performative = %msg.performative,
                                to = %receiver,
                                price = %msg.content,
                                "Sending verdict"
                            );
                            send_to(
                                &*self.transport,
                                self.protocol.agent_id(),
                                msg.performative,
                                receiver,
                                msg.content.as_str(),
                                conversation_id,
                            )
                            .await?;
                            record_message_sent(msg.performative.as_str());
                            verdicts_sent += 1;
                        }
                    }
                    self.protocol.verdicts_sent()?;
                    record_auction_completed(decision.winner.is_some());
                }
                BuyerState::End => {
                    info!(state = self.protocol.state_name(), "Auction finished");
                    return Ok(AuctionOutcome::from_session(
                        self.protocol.into_session(),
                        verdicts_sent,
                    ));
                }
            }
        }
    }

    async fn wait_for_reply(&mut self, deadline: Option<Instant>) -> Result<(), ProtocolError> {
        let Some(template) = self.protocol.receive_template() else {
            return Ok(());
        };

        let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
        let msg = match self.transport.receive(self.id(), &template, remaining).await {
            Ok(msg) => msg,
            Err(TransportError::Timeout(_)) => {
                warn!(
                    limit = ?self.reply_timeout,
                    replied = self.protocol.session().reply_count(),
                    expected = self.protocol.session().expected_sellers().len(),
                    "Gave up waiting for replies"
                );
                return Err(ProtocolError::Timeout);
            }
            Err(e) => return Err(e.into()),
        };

        match self.protocol.handle_reply(&msg) {
            Ok(Reply::Offer(offer)) => {
                record_message_received(msg.performative.as_str());
                info!(seller = %offer.seller, price = offer.price, "Received proposal");
            }
            Ok(Reply::Refusal(refusal)) => {
                record_message_received(msg.performative.as_str());
                info!(seller = %refusal.seller, reason = %refusal.reason, "Seller refused");
            }
            Err(e) if e.is_ignorable() => {
                record_reply_ignored(e.kind());
                warn!(sender = %msg.sender, error = %e, "Ignoring reply");
            }
            Err(e) => return Err(e),
        }

        debug!(
            replied = self.protocol.session().reply_count(),
            expected = self.protocol.session().expected_sellers().len(),
            "Reply counter"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::AclMessage;
    use crate::transport::{LocalBus, MessageTemplate};

    fn id(name: &str) -> AgentId {
        AgentId::new(name)
    }

    fn setup(names: &[&str]) -> (Arc<LocalBus>, BuyerAgent<LocalBus>) {
        let bus = Arc::new(LocalBus::new());
        bus.register(&id("JACK")).unwrap();
        for name in names {
            bus.register(&id(name)).unwrap();
        }
        let session = AuctionSession::new("conv-1", names.iter().map(|n| id(n)));
        let protocol = BuyerProtocol::new(id("JACK"), "Looking for a bike", session);
        (bus.clone(), BuyerAgent::new(protocol, bus))
    }

    async fn reply(bus: &LocalBus, from: &str, performative: Performative, content: &str) {
        let cfp = bus
            .receive(
                &id(from),
                &MessageTemplate::match_performative(Performative::CallForProposals),
                None,
            )
            .await
            .unwrap();
        bus.send(cfp.create_reply(id(from), performative).with_content(content))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_buyer_collects_and_decides() {
        let (bus, agent) = setup(&["A", "B"]);
        let buyer = tokio::spawn(agent.run());

        reply(&bus, "B", Performative::Propose, "30").await;
        reply(&bus, "A", Performative::Propose, "20").await;

        let outcome = buyer.await.unwrap().unwrap();
        assert_eq!(outcome.winner.map(|o| o.seller), Some(id("A")));
        assert_eq!(outcome.verdicts_sent, 2);
        assert_eq!(outcome.offers[0].seller, id("B"));

        let a = bus.receive(&id("A"), &MessageTemplate::Any, None).await.unwrap();
        let b = bus.receive(&id("B"), &MessageTemplate::Any, None).await.unwrap();
        assert_eq!((a.performative, a.content.as_str()), (Performative::Accept, "20"));
        assert_eq!((b.performative, b.content.as_str()), (Performative::Reject, "30"));
    }

    #[tokio::test]
    async fn test_buyer_ignores_noise_until_join() {
        let (bus, agent) = setup(&["A", "B"]);
        bus.register(&id("EVE")).unwrap();
        let buyer = tokio::spawn(agent.run());

        reply(&bus, "A", Performative::Propose, "garbage").await;
        // The malformed quote did not count, so A's next one does
        let again = AclMessage::new(Performative::Propose, id("A"), vec![id("JACK")])
            .with_content("40")
            .with_conversation("conv-1");
        bus.send(again.clone()).await.unwrap();
        bus.send(again.with_content("1")).await.unwrap();
        let stranger = AclMessage::new(Performative::Propose, id("EVE"), vec![id("JACK")])
            .with_content("0")
            .with_conversation("conv-1");
        bus.send(stranger).await.unwrap();
        reply(&bus, "B", Performative::Refuse, "no stock").await;

        let outcome = buyer.await.unwrap().unwrap();
        assert_eq!(
            outcome.winner,
            Some(Offer {
                seller: id("A"),
                price: 40
            })
        );
        assert_eq!(outcome.verdicts_sent, 1);
        assert_eq!(outcome.refusals.len(), 1);
        // Stranger's proposal never matched the receive template
        assert_eq!(bus.pending(&id("JACK")), 1);
    }

    #[tokio::test]
    async fn test_buyer_reply_timeout() {
        let (bus, agent) = setup(&["A", "B"]);
        let agent = agent.with_reply_timeout(Some(Duration::from_millis(50)));
        let buyer = tokio::spawn(agent.run());

        reply(&bus, "A", Performative::Propose, "20").await;

        let err = buyer.await.unwrap().unwrap_err();
        assert_eq!(err, ProtocolError::Timeout);
        // No verdict goes out for an unfinished round
        assert_eq!(bus.pending(&id("A")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout_bounds_whole_round() {
        let (bus, agent) = setup(&["A", "B"]);
        let agent = agent.with_reply_timeout(Some(Duration::from_millis(100)));
        let start = Instant::now();
        let buyer = tokio::spawn(agent.run());

        reply(&bus, "A", Performative::Propose, "20").await;
        // A keeps repeating itself; each duplicate is ignored and must not
        // push the deadline back
        let noisy = bus.clone();
        let noise = tokio::spawn(async move {
            let dup = AclMessage::new(Performative::Propose, id("A"), vec![id("JACK")])
                .with_content("20")
                .with_conversation("conv-1");
            for _ in 0..50 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let _ = noisy.send(dup.clone()).await;
            }
        });

        let err = buyer.await.unwrap().unwrap_err();
        assert_eq!(err, ProtocolError::Timeout);
        assert!(start.elapsed() < Duration::from_millis(200));
        noise.abort();
    }

    #[tokio::test]
    async fn test_all_refusals_send_no_verdicts() {
        let (bus, agent) = setup(&["A", "B"]);
        let buyer = tokio::spawn(agent.run());

        reply(&bus, "A", Performative::Refuse, "no stock").await;
        reply(&bus, "B", Performative::Refuse, "no stock").await;

        let outcome = buyer.await.unwrap().unwrap();
        assert!(outcome.winner.is_none());
        assert_eq!(outcome.verdicts_sent, 0);
        assert_eq!(bus.pending(&id("A")), 0);
        assert_eq!(bus.pending(&id("B")), 0);
    }
}
