// transport/local.rs - In-process message bus

use super::{MessageTemplate, MessageTransport, TransportError};
use crate::acl_message::{AclMessage, AgentId};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// Queue of undelivered messages for one agent
#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<AclMessage>>,
    notify: Notify,
}

impl Mailbox {
    fn push(&self, msg: AclMessage) {
        self.queue.lock().push_back(msg);
        self.notify.notify_one();
    }

    fn take_matching(&self, template: &MessageTemplate) -> Option<AclMessage> {
        let mut queue = self.queue.lock();
        let position = queue.iter().position(|m| template.matches(m))?;
        queue.remove(position)
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// In-process transport with one mailbox per registered agent.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct LocalBus {
    mailboxes: Arc<DashMap<AgentId, Arc<Mailbox>>>,
    delivered: Arc<Mutex<Vec<AclMessage>>>,
    closed: Arc<AtomicBool>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn mailbox(&self, agent: &AgentId) -> Result<Arc<Mailbox>, TransportError> {
        self.mailboxes
            .get(agent)
            .map(|m| m.value().clone())
            .ok_or_else(|| TransportError::UnknownAgent(agent.clone()))
    }

    /// Every message accepted by `send`, in send order
    pub fn delivered(&self) -> Vec<AclMessage> {
        self.delivered.lock().clone()
    }

    /// Messages still queued for an agent
    pub fn pending(&self, agent: &AgentId) -> usize {
        self.mailbox(agent).map(|m| m.len()).unwrap_or(0)
    }

    /// Stop accepting messages and wake every blocked receiver.
    ///
    /// Messages already queued can still be received.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for entry in self.mailboxes.iter() {
            entry.value().notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn wait_for(
        &self,
        mailbox: Arc<Mailbox>,
        template: &MessageTemplate,
    ) -> Result<AclMessage, TransportError> {
        loop {
            let notified = mailbox.notify.notified();
            if let Some(msg) = mailbox.take_matching(template) {
                return Ok(msg);
            }
            if self.is_closed() {
                return Err(TransportError::Closed);
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageTransport for LocalBus {
    fn register(&self, agent: &AgentId) -> Result<(), TransportError> {
        match self.mailboxes.entry(agent.clone()) {
            Entry::Occupied(_) => Err(TransportError::AlreadyRegistered(agent.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mailbox::default()));
                Ok(())
            }
        }
    }

    async fn send(&self, msg: AclMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if msg.receivers.is_empty() {
            return Err(TransportError::NoReceivers);
        }

        let targets = msg
            .receivers
            .iter()
            .map(|r| self.mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(
            sender = %msg.sender,
            performative = %msg.performative,
            receivers = msg.receivers.len(),
            "Delivering message"
        );

        self.delivered.lock().push(msg.clone());
        for mailbox in targets {
            mailbox.push(msg.clone());
        }
        Ok(())
    }

    async fn receive(
        &self,
        agent: &AgentId,
        template: &MessageTemplate,
        timeout: Option<Duration>,
    ) -> Result<AclMessage, TransportError> {
        let mailbox = self.mailbox(agent)?;
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_for(mailbox, template))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.wait_for(mailbox, template).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::Performative;
    use crate::transport::{broadcast, send_to};

    fn id(name: &str) -> AgentId {
        AgentId::new(name)
    }

    fn bus_with(names: &[&str]) -> LocalBus {
        let bus = LocalBus::new();
        for name in names {
            bus.register(&id(name)).unwrap();
        }
        bus
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_receiver() {
        let bus = bus_with(&["JACK", "A", "B"]);
        broadcast(&bus, &id("JACK"), Performative::CallForProposals, &[id("A"), id("B")], "bike", "conv-1")
            .await
            .unwrap();

        let any = MessageTemplate::Any;
        let a = bus.receive(&id("A"), &any, None).await.unwrap();
        let b = bus.receive(&id("B"), &any, None).await.unwrap();
        assert_eq!(a.content, "bike");
        assert_eq!(a.message_id, b.message_id);
        assert_eq!(bus.delivered().len(), 1);
        assert_eq!(bus.pending(&id("JACK")), 0);
    }

    #[tokio::test]
    async fn test_selective_receive_leaves_other_messages_queued() {
        let bus = bus_with(&["JACK", "A"]);
        send_to(&bus, &id("JACK"), Performative::Accept, &id("A"), "10", "conv-1").await.unwrap();
        send_to(&bus, &id("JACK"), Performative::CallForProposals, &id("A"), "bike", "conv-1")
            .await
            .unwrap();

        let cfp = MessageTemplate::match_performative(Performative::CallForProposals);
        let first = bus.receive(&id("A"), &cfp, None).await.unwrap();
        assert_eq!(first.performative, Performative::CallForProposals);
        assert_eq!(bus.pending(&id("A")), 1);

        let accept = bus.receive(&id("A"), &MessageTemplate::Any, None).await.unwrap();
        assert_eq!(accept.performative, Performative::Accept);
    }

    #[tokio::test]
    async fn test_receive_blocks_until_send() {
        let bus = bus_with(&["JACK", "A"]);
        let receiver = bus.clone();
        let handle = tokio::spawn(async move {
            receiver
                .receive(&id("JACK"), &MessageTemplate::match_sender(id("A")), None)
                .await
        });

        tokio::task::yield_now().await;
        send_to(&bus, &id("A"), Performative::Propose, &id("JACK"), "5", "conv-1").await.unwrap();

        let msg = handle.await.unwrap().unwrap();
        assert_eq!(msg.content, "5");
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let bus = bus_with(&["JACK"]);
        let err = bus
            .receive(&id("JACK"), &MessageTemplate::Any, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_receivers() {
        let bus = bus_with(&["A"]);
        let receiver = bus.clone();
        let handle = tokio::spawn(async move {
            receiver.receive(&id("A"), &MessageTemplate::Any, None).await
        });

        tokio::task::yield_now().await;
        bus.close();
        assert_eq!(handle.await.unwrap(), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_queued_messages_survive_close() {
        let bus = bus_with(&["JACK", "A"]);
        send_to(&bus, &id("JACK"), Performative::Reject, &id("A"), "10", "conv-1").await.unwrap();
        bus.close();

        let msg = bus.receive(&id("A"), &MessageTemplate::Any, None).await;
        tokio_test::assert_ok!(msg);
        assert_eq!(
            send_to(&bus, &id("JACK"), Performative::Reject, &id("A"), "10", "conv-1").await,
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn test_unknown_receiver_delivers_nothing() {
        let bus = bus_with(&["JACK", "A"]);
        let err = broadcast(&bus, &id("JACK"), Performative::CallForProposals, &[id("A"), id("Z")], "x", "conv-1")
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownAgent(id("Z")));
        assert_eq!(bus.pending(&id("A")), 0);
        assert!(bus.delivered().is_empty());
    }

    #[test]
    fn test_double_registration() {
        let bus = bus_with(&["A"]);
        assert_eq!(bus.register(&id("A")), Err(TransportError::AlreadyRegistered(id("A"))));
    }

    #[test]
    fn test_concurrent_registration_admits_one() {
        let bus = LocalBus::new();
        let admitted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| bus.register(&id("A")).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(admitted, 1);
    }
}
