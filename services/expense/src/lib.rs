pub mod middleware;
pub mod models;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use models::ExpenseCommand;
pub use router::{create_router, AppState};
pub use service::ExpenseService;

/// Command queue consumed by the expense worker.
pub const EXPENSE_QUEUE: &str = "expenseQueue";
