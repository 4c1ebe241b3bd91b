use async_nats::{Client, ConnectOptions, Event, HeaderMap};
use async_trait::async_trait;
use futures::StreamExt;

use crate::broker::{Broker, BrokerError, Message, MessageStream, ReplySubscription};
use crate::envelope::{ACTION_HEADER, CORRELATION_HEADER};

/// [`Broker`] over a single NATS connection.
///
/// Command queues map to subjects consumed through a queue group of the same
/// name, so several worker processes share one queue. Reply subscriptions
/// are inbox subjects; dropping the subscriber unsubscribes it.
pub struct NatsBroker {
    client: Client,
    url: String,
}

impl NatsBroker {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let options = ConnectOptions::new()
            .retry_on_initial_connect()
            .event_callback(|event| async move {
                match event {
                    Event::Disconnected => tracing::warn!("NATS disconnected"),
                    Event::Connected => tracing::info!("NATS connected"),
                    other => tracing::debug!(event = %other, "NATS event"),
                }
            });

        let client = options
            .connect(url)
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

fn headers_for(message: &Message) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(action) = &message.action {
        headers.insert(ACTION_HEADER, action.as_str());
    }
    if let Some(correlation_id) = &message.correlation_id {
        headers.insert(CORRELATION_HEADER, correlation_id.as_str());
    }
    headers
}

fn from_nats(message: async_nats::Message) -> Message {
    let header = |name: &str| {
        message
            .headers
            .as_ref()
            .and_then(|headers| headers.get(name))
            .map(|value| value.as_str().to_string())
    };

    Message {
        action: header(ACTION_HEADER),
        correlation_id: header(CORRELATION_HEADER),
        reply_to: message.reply.as_ref().map(|reply| reply.to_string()),
        body: message.payload.clone(),
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        // Subjects exist implicitly on NATS.
        tracing::debug!(queue = name, "declared command subject");
        Ok(())
    }

    async fn reply_subscription(&self) -> Result<ReplySubscription, BrokerError> {
        let inbox = self.client.new_inbox();
        let subscriber = self
            .client
            .subscribe(inbox.clone())
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        // SUB must reach the server before the command's PUB does.
        self.client
            .flush()
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        Ok(ReplySubscription::new(
            inbox,
            Box::pin(subscriber.map(from_nats)),
        ))
    }

    async fn publish(&self, destination: &str, message: Message) -> Result<(), BrokerError> {
        let headers = headers_for(&message);
        let result = match message.reply_to {
            Some(reply_to) => {
                self.client
                    .publish_with_reply_and_headers(
                        destination.to_string(),
                        reply_to,
                        headers,
                        message.body,
                    )
                    .await
            }
            None => {
                self.client
                    .publish_with_headers(destination.to_string(), headers, message.body)
                    .await
            }
        };

        result.map_err(|e| BrokerError::Publish {
            destination: destination.to_string(),
            reason: e.to_string(),
        })
    }

    async fn consume(&self, queue: &str) -> Result<MessageStream, BrokerError> {
        let subscriber = self
            .client
            .queue_subscribe(queue.to_string(), queue.to_string())
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        Ok(Box::pin(subscriber.map(from_nats)))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.client
            .flush()
            .await
            .map_err(|e| BrokerError::Publish {
                destination: self.url.clone(),
                reason: e.to_string(),
            })
    }
}
