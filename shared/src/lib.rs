//! Shared plumbing for the expense and user services: the broker channel,
//! the request/response bridge on top of it, and the collaborators every
//! worker and gateway needs.

pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod http;
pub mod jwt;
pub mod logger;
pub mod nats;
pub mod pg_store;
pub mod publisher;
pub mod router;
pub mod shutdown;
pub mod store;


pub use broker::{Broker, BrokerError, InMemoryBroker, Message, ReplySubscription};
pub use config::Settings;
pub use dispatcher::{DispatchError, RequestDispatcher};
pub use envelope::{CorrelationId, Envelope, HandlerResult, GENERIC_FAILURE};
pub use http::GatewayError;
pub use jwt::{Claims, CredentialError, TokenIssuer};
pub use nats::NatsBroker;
pub use publisher::ResponsePublisher;
pub use router::{CommandHandler, CommandRouter, CommandSet, DropReason, RouteOutcome};
pub use store::{DocumentStore, Filter, MemoryStore, StoreError};
