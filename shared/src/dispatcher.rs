//! Request dispatcher: a synchronous-looking call over publish/consume.
//!
//! Each call owns a fresh reply subscription and correlation identifier.
//! The subscription is live before the command is published, so a fast
//! worker can never answer into the void. The wait is bounded by a deadline
//! and the subscription is released on every exit path, including when the
//! caller's future is dropped.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::broker::{Broker, BrokerError, Message, ReplySubscription};
use crate::envelope::{CorrelationId, Envelope, HandlerResult};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to create reply subscription: {0}")]
    Subscribe(#[source] BrokerError),
    #[error("failed to publish command: {0}")]
    Publish(#[source] BrokerError),
    #[error("failed to decode service response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("\"success\" field is not found in service response")]
    MissingSuccess,
    #[error("request rejected: {message}")]
    Rejected { message: String },
    #[error("reply stream closed before a matching response arrived")]
    NoResponse,
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// The far side never answered, as opposed to answering badly.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::NoResponse | Self::Timeout(_))
    }
}

pub struct RequestDispatcher {
    broker: Arc<dyn Broker>,
    command_queue: String,
    deadline: Duration,
}

impl RequestDispatcher {
    pub fn new(broker: Arc<dyn Broker>, command_queue: impl Into<String>, deadline: Duration) -> Self {
        Self {
            broker,
            command_queue: command_queue.into(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Publish `payload` under `action` and wait for the matching response.
    ///
    /// Returns the decoded result only when the worker reported
    /// `success: true`; a `success: false` answer becomes
    /// [`DispatchError::Rejected`].
    pub async fn call<Req, Resp>(
        &self,
        action: &str,
        payload: &Req,
    ) -> Result<HandlerResult<Resp>, DispatchError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(&Envelope::new(action, payload)).map_err(DispatchError::Encode)?;

        let correlation_id = CorrelationId::mint();
        let mut subscription = self.broker.reply_subscription().await.map_err(|err| {
            tracing::error!(action, correlation_id = %correlation_id, error = %err, "reply subscription failed");
            DispatchError::Subscribe(err)
        })?;

        let command = Message::command(action, &correlation_id, subscription.address(), body);
        self.broker
            .publish(&self.command_queue, command)
            .await
            .map_err(|err| {
                tracing::error!(action, correlation_id = %correlation_id, error = %err, "command publish failed");
                DispatchError::Publish(err)
            })?;

        tracing::debug!(
            action,
            correlation_id = %correlation_id,
            reply_to = subscription.address(),
            queue = %self.command_queue,
            "command published"
        );

        let reply = match tokio::time::timeout(
            self.deadline,
            await_reply(&mut subscription, &correlation_id),
        )
        .await
        {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                tracing::warn!(action, correlation_id = %correlation_id, "reply stream closed without a match");
                return Err(DispatchError::NoResponse);
            }
            Err(_) => {
                tracing::warn!(action, correlation_id = %correlation_id, deadline = ?self.deadline, "call timed out");
                return Err(DispatchError::Timeout(self.deadline));
            }
        };
        drop(subscription);

        decode_reply(&reply.body).map_err(|err| {
            if !matches!(err, DispatchError::Rejected { .. }) {
                tracing::error!(action, correlation_id = %correlation_id, error = %err, "bad service response");
            }
            err
        })
    }
}

/// Drain `subscription` until a message carries `correlation_id`.
///
/// The subscription is exclusive to one call, so a mismatch means the
/// broker or a worker broke the protocol. It is logged and skipped.
pub async fn await_reply(
    subscription: &mut ReplySubscription,
    correlation_id: &CorrelationId,
) -> Option<Message> {
    while let Some(message) = subscription.next().await {
        if correlation_id.matches(message.correlation_id.as_deref()) {
            return Some(message);
        }
        tracing::error!(
            expected = %correlation_id,
            received = ?message.correlation_id,
            reply_to = subscription.address(),
            "correlation mismatch on exclusive reply queue, message discarded"
        );
    }
    None
}

/// Decode a response envelope, enforcing the `success` contract.
pub fn decode_reply<T: DeserializeOwned>(body: &[u8]) -> Result<HandlerResult<T>, DispatchError> {
    let envelope: Envelope<Value> = serde_json::from_slice(body).map_err(DispatchError::Decode)?;

    let success = envelope
        .data
        .get("success")
        .and_then(Value::as_bool)
        .ok_or(DispatchError::MissingSuccess)?;

    if !success {
        let message = envelope
            .data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(DispatchError::Rejected { message });
    }

    serde_json::from_value(envelope.data).map_err(DispatchError::Decode)
}
