//! Worker-side command router.
//!
//! One sequential loop per worker consumes the service's command queue,
//! routes on the `action` header and answers through the
//! [`ResponsePublisher`]. Payloads are decoded once, here, into the
//! service's command enum; handlers only ever see typed commands.
//!
//! A handler that panics takes the loop down with it. Its caller gets no
//! response and times out.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, BrokerError, Message};
use crate::envelope::{CorrelationId, Envelope, HandlerResult, GENERIC_FAILURE};
use crate::publisher::ResponsePublisher;

/// The closed set of commands one service understands.
pub trait CommandSet: Sized + Send {
    fn accepts(action: &str) -> bool;

    /// Decode the envelope's `data` for an accepted action.
    fn decode(action: &str, data: Value) -> Result<Self, serde_json::Error>;
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    type Command: CommandSet;

    async fn handle(&self, command: Self::Command) -> HandlerResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingAction,
    UnknownAction(String),
    MissingReplyAddress,
    MissingCorrelationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Answered,
    Dropped(DropReason),
}

pub struct CommandRouter<H> {
    broker: Arc<dyn Broker>,
    queue: String,
    handler: H,
    publisher: ResponsePublisher,
}

impl<H: CommandHandler> CommandRouter<H> {
    pub fn new(broker: Arc<dyn Broker>, queue: impl Into<String>, handler: H) -> Self {
        let publisher = ResponsePublisher::new(broker.clone());
        Self {
            broker,
            queue: queue.into(),
            handler,
            publisher,
        }
    }

    /// Consume until the queue's stream ends or `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        self.broker.declare_queue(&self.queue).await?;
        let mut messages = self.broker.consume(&self.queue).await?;
        tracing::info!(queue = %self.queue, "command router started");

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = messages.next() => match next {
                    Some(message) => message,
                    None => {
                        tracing::warn!(queue = %self.queue, "command stream closed by broker");
                        break;
                    }
                },
            };
            self.route(message).await;
        }

        tracing::info!(queue = %self.queue, "command router stopped");
        Ok(())
    }

    /// Route a single command message.
    pub async fn route(&self, message: Message) -> RouteOutcome {
        let Some(action) = message.action.as_deref().filter(|action| !action.is_empty()) else {
            tracing::warn!(queue = %self.queue, "message without action header dropped");
            return RouteOutcome::Dropped(DropReason::MissingAction);
        };

        if !H::Command::accepts(action) {
            tracing::warn!(queue = %self.queue, action, "Action ({action}) is unknown!");
            return RouteOutcome::Dropped(DropReason::UnknownAction(action.to_string()));
        }

        let Some(reply_to) = message.reply_to.as_deref() else {
            tracing::warn!(action, "command without reply address dropped");
            return RouteOutcome::Dropped(DropReason::MissingReplyAddress);
        };

        let Some(correlation_id) = message.correlation_id.clone().map(CorrelationId::from) else {
            tracing::warn!(action, reply_to, "command without correlation id dropped");
            return RouteOutcome::Dropped(DropReason::MissingCorrelationId);
        };

        let result = match decode_command::<H::Command>(action, &message.body) {
            Ok(command) => self.handler.handle(command).await,
            Err(err) => {
                tracing::warn!(action, correlation_id = %correlation_id, error = %err, "malformed command payload");
                HandlerResult::failure(GENERIC_FAILURE)
            }
        };

        tracing::debug!(action, correlation_id = %correlation_id, success = result.success, "command handled");
        self.publisher
            .publish(reply_to, &correlation_id, action, &result)
            .await;
        RouteOutcome::Answered
    }
}

fn decode_command<C: CommandSet>(action: &str, body: &[u8]) -> Result<C, serde_json::Error> {
    let envelope: Envelope<Value> = serde_json::from_slice(body)?;
    C::decode(action, envelope.data)
}
