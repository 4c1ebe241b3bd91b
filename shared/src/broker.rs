//! Broker channel abstraction.
//!
//! The gateway and worker halves of a service only ever talk through a
//! [`Broker`]: declare a queue, publish a message, consume a queue, or open a
//! per-call [`ReplySubscription`]. `NatsBroker` backs this in production and
//! [`InMemoryBroker`] backs tests and single-process runs.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::envelope::CorrelationId;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("queue {0} is not declared")]
    UnknownQueue(String),
    #[error("queue {0} already has a consumer")]
    QueueInUse(String),
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("publish to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },
    #[error("broker is closed")]
    Closed,
}

/// A message as seen by the broker.
///
/// `action` and `correlation_id` are metadata, carried outside the body.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub action: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub body: Bytes,
}

impl Message {
    pub fn command(
        action: &str,
        correlation_id: &CorrelationId,
        reply_to: &str,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            action: Some(action.to_string()),
            correlation_id: Some(correlation_id.to_string()),
            reply_to: Some(reply_to.to_string()),
            body: body.into(),
        }
    }

    pub fn reply(action: &str, correlation_id: &CorrelationId, body: impl Into<Bytes>) -> Self {
        Self {
            action: Some(action.to_string()),
            correlation_id: Some(correlation_id.to_string()),
            reply_to: None,
            body: body.into(),
        }
    }
}

pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Exclusive, short-lived queue receiving the response to one call.
///
/// The subscription is live as soon as it is returned. Dropping it releases
/// the queue on the broker.
pub struct ReplySubscription {
    address: String,
    messages: MessageStream,
}

impl ReplySubscription {
    pub fn new(address: impl Into<String>, messages: MessageStream) -> Self {
        Self {
            address: address.into(),
            messages,
        }
    }

    /// Name other parties publish to when replying.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn next(&mut self) -> Option<Message> {
        self.messages.next().await
    }
}

impl std::fmt::Debug for ReplySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySubscription")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Make sure a shared command queue exists. Idempotent.
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError>;

    /// Create a broker-named, exclusive reply queue and start consuming it.
    async fn reply_subscription(&self) -> Result<ReplySubscription, BrokerError>;

    /// Fire-and-forget publish. Unroutable messages are dropped by the broker.
    async fn publish(&self, destination: &str, message: Message) -> Result<(), BrokerError>;

    /// Consume a declared queue. The stream ends when the broker closes it.
    async fn consume(&self, queue: &str) -> Result<MessageStream, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

struct QueueSlot {
    sender: mpsc::UnboundedSender<Message>,
    receiver: Option<mpsc::UnboundedReceiver<Message>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
struct Registry {
    queues: DashMap<String, QueueSlot>,
    published: AtomicU64,
    closed: AtomicBool,
}

/// Process-local broker built on unbounded channels.
///
/// Reply queues are removed when their subscription is dropped. Closing the
/// broker drops every queue, which ends every open stream.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    registry: Arc<Registry>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish calls accepted so far, routable or not.
    pub fn published_count(&self) -> u64 {
        self.registry.published.load(Ordering::SeqCst)
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.registry.queues.contains_key(name)
    }

    pub fn queue_count(&self) -> usize {
        self.registry.queues.len()
    }

    /// Delete one queue, ending its consumer's stream once drained.
    pub fn close_queue(&self, name: &str) {
        self.registry.queues.remove(name);
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.registry.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.registry
            .queues
            .entry(name.to_string())
            .or_insert_with(QueueSlot::new);
        Ok(())
    }

    async fn reply_subscription(&self) -> Result<ReplySubscription, BrokerError> {
        self.ensure_open()?;
        let name = format!("amq.gen-{}", Uuid::new_v4().simple());
        let mut slot = QueueSlot::new();
        let receiver = slot.receiver.take();
        self.registry.queues.insert(name.clone(), slot);

        let stream = QueueStream {
            receiver,
            name: name.clone(),
            registry: Arc::downgrade(&self.registry),
            auto_delete: true,
        };
        Ok(ReplySubscription::new(name, Box::pin(stream)))
    }

    async fn publish(&self, destination: &str, message: Message) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.registry.published.fetch_add(1, Ordering::SeqCst);

        match self.registry.queues.get(destination) {
            Some(slot) => {
                if slot.sender.send(message).is_err() {
                    tracing::debug!(destination, "queue receiver gone, message dropped");
                }
            }
            None => tracing::debug!(destination, "unroutable message dropped"),
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<MessageStream, BrokerError> {
        self.ensure_open()?;
        let mut slot = self
            .registry
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| BrokerError::QueueInUse(queue.to_string()))?;
        drop(slot);

        Ok(Box::pin(QueueStream {
            receiver: Some(receiver),
            name: queue.to_string(),
            registry: Arc::downgrade(&self.registry),
            auto_delete: false,
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.registry.closed.store(true, Ordering::SeqCst);
        self.registry.queues.clear();
        Ok(())
    }
}

/// Consumer end of an in-memory queue.
///
/// On drop, an auto-delete queue is removed; a shared queue gets its
/// receiver back so another consumer can attach.
struct QueueStream {
    receiver: Option<mpsc::UnboundedReceiver<Message>>,
    name: String,
    registry: Weak<Registry>,
    auto_delete: bool,
}

impl Stream for QueueStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        match self.get_mut().receiver.as_mut() {
            Some(receiver) => receiver.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for QueueStream {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if self.auto_delete {
            registry.queues.remove(&self.name);
        } else if let Some(mut slot) = registry.queues.get_mut(&self.name) {
            slot.receiver = self.receiver.take();
        }
    }
}
