//! Both services wired over one in-memory broker.

#![allow(dead_code)]

use expense_service::{ExpenseService, EXPENSE_QUEUE};
use shared::broker::{Broker, InMemoryBroker};
use shared::dispatcher::RequestDispatcher;
use shared::jwt::TokenIssuer;
use shared::router::CommandRouter;
use shared::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use user_service::{UserService, USER_QUEUE};

pub const SECRET: &str = "integration-secret";

pub struct System {
    pub broker: InMemoryBroker,
    pub expenses: Arc<MemoryStore>,
    pub users: Arc<MemoryStore>,
    pub tokens: TokenIssuer,
    pub shutdown: CancellationToken,
}

impl System {
    pub async fn start() -> Self {
        let broker = InMemoryBroker::new();
        broker.declare_queue(EXPENSE_QUEUE).await.unwrap();
        broker.declare_queue(USER_QUEUE).await.unwrap();

        let expenses = Arc::new(MemoryStore::new());
        let users = Arc::new(MemoryStore::new());
        let tokens = TokenIssuer::new(SECRET, chrono::Duration::hours(1));
        let shutdown = CancellationToken::new();

        let shared_broker: Arc<dyn Broker> = Arc::new(broker.clone());
        tokio::spawn(
            CommandRouter::new(shared_broker.clone(), EXPENSE_QUEUE, ExpenseService::new(expenses.clone()))
                .run(shutdown.clone()),
        );
        tokio::spawn(
            CommandRouter::new(shared_broker, USER_QUEUE, UserService::new(users.clone(), tokens.clone()))
                .run(shutdown.clone()),
        );

        Self {
            broker,
            expenses,
            users,
            tokens,
            shutdown,
        }
    }

    pub fn dispatcher(&self, queue: &str, deadline: Duration) -> RequestDispatcher {
        RequestDispatcher::new(Arc::new(self.broker.clone()), queue, deadline)
    }

    pub fn expense_dispatcher(&self) -> RequestDispatcher {
        self.dispatcher(EXPENSE_QUEUE, Duration::from_secs(5))
    }

    pub fn user_dispatcher(&self) -> RequestDispatcher {
        // Password hashing is slow in unoptimised builds.
        self.dispatcher(USER_QUEUE, Duration::from_secs(30))
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
