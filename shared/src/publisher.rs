use serde::Serialize;
use std::sync::Arc;

use crate::broker::{Broker, Message};
use crate::envelope::{response_action, CorrelationId, Envelope, HandlerResult};

/// Sends a handler's result back to the caller's reply address.
///
/// Failures stay local: they are logged and never retried. The caller sees
/// them as a missing response.
#[derive(Clone)]
pub struct ResponsePublisher {
    broker: Arc<dyn Broker>,
}

impl ResponsePublisher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub async fn publish<T: Serialize>(
        &self,
        reply_to: &str,
        correlation_id: &CorrelationId,
        action: &str,
        result: &HandlerResult<T>,
    ) {
        let action = response_action(action);
        let body = match serde_json::to_vec(&Envelope::new(action.as_str(), result)) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(action = %action, correlation_id = %correlation_id, error = %err, "failed to encode response");
                return;
            }
        };

        let message = Message::reply(&action, correlation_id, body);
        if let Err(err) = self.broker.publish(reply_to, message).await {
            tracing::error!(
                action = %action,
                correlation_id = %correlation_id,
                reply_to,
                error = %err,
                "failed to publish response"
            );
        }
    }
}
