use async_trait::async_trait;
use shared::envelope::{HandlerResult, GENERIC_FAILURE};
use shared::router::CommandHandler;
use shared::store::{from_document, to_document, DocumentStore, Filter, StoreError};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AddExpenseRequest, AddedExpense, Expense, ExpenseCommand, ExpenseList, GetExpenseRequest,
    RemoveExpenseRequest, UpdateExpenseRequest, EXPENSE_NOT_FOUND, NO_EXPENSES, OPERATION_SUCCESSFUL,
};

/// Worker side of the expense service. Every query is scoped to the
/// requesting user.
pub struct ExpenseService {
    store: Arc<dyn DocumentStore>,
}

impl ExpenseService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, request: GetExpenseRequest) -> Result<HandlerResult, StoreError> {
        if let Err(message) = request.filter.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let mut filter = Filter::new().eq("userId", request.user_id.as_str());
        if let Some(expense_id) = request.filter.expense_id {
            filter = filter.eq("expenseId", expense_id);
        }
        if let Some(category) = request.filter.category {
            filter = filter.eq("category", category);
        }

        let expenses = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(from_document::<Expense>)
            .collect::<Result<Vec<_>, _>>()?;

        let message = if expenses.is_empty() { NO_EXPENSES } else { OPERATION_SUCCESSFUL };
        Ok(HandlerResult::with_data(message, &ExpenseList { expenses }))
    }

    pub async fn add(&self, request: AddExpenseRequest) -> Result<HandlerResult, StoreError> {
        if let Err(message) = request.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let expense = Expense {
            expense_id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            description: request.description,
            amount: request.amount,
            category: request.category,
        };
        self.store.insert(to_document(&expense)?).await?;

        tracing::info!(expense_id = %expense.expense_id, user_id = %expense.user_id, "expense added");
        let added = AddedExpense {
            expense_id: expense.expense_id,
        };
        Ok(HandlerResult::with_data(OPERATION_SUCCESSFUL, &added))
    }

    pub async fn update(&self, request: UpdateExpenseRequest) -> Result<HandlerResult, StoreError> {
        if let Err(message) = request.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let filter = owned_expense(&request.user_id, &request.expense_id);
        if self.store.find(&filter).await?.is_empty() {
            return Ok(HandlerResult::failure(EXPENSE_NOT_FOUND));
        }

        let expense = Expense {
            expense_id: request.expense_id,
            user_id: request.user_id,
            description: request.description,
            amount: request.amount,
            category: request.category,
        };
        self.store.update(&filter, to_document(&expense)?).await?;

        tracing::info!(expense_id = %expense.expense_id, user_id = %expense.user_id, "expense updated");
        Ok(HandlerResult::done(OPERATION_SUCCESSFUL))
    }

    pub async fn remove(&self, request: RemoveExpenseRequest) -> Result<HandlerResult, StoreError> {
        if let Err(message) = request.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let filter = owned_expense(&request.user_id, &request.expense_id);
        if self.store.find(&filter).await?.is_empty() {
            return Ok(HandlerResult::failure(EXPENSE_NOT_FOUND));
        }
        self.store.delete(&filter).await?;

        tracing::info!(expense_id = %request.expense_id, user_id = %request.user_id, "expense removed");
        Ok(HandlerResult::done(OPERATION_SUCCESSFUL))
    }
}

fn owned_expense(user_id: &str, expense_id: &str) -> Filter {
    Filter::new().eq("userId", user_id).eq("expenseId", expense_id)
}

#[async_trait]
impl CommandHandler for ExpenseService {
    type Command = ExpenseCommand;

    async fn handle(&self, command: ExpenseCommand) -> HandlerResult {
        let action = command.action();
        let result = match command {
            ExpenseCommand::Get(request) => self.get(request).await,
            ExpenseCommand::Add(request) => self.add(request).await,
            ExpenseCommand::Update(request) => self.update(request).await,
            ExpenseCommand::Remove(request) => self.remove(request).await,
        };

        result.unwrap_or_else(|err| {
            tracing::error!(action, error = %err, "expense store operation failed");
            HandlerResult::failure(GENERIC_FAILURE)
        })
    }
}
