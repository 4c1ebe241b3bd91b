//! Expense documents and the command payloads exchanged over the broker.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::router::CommandSet;

pub const GET_EXPENSE: &str = "GetExpense";
pub const ADD_EXPENSE: &str = "AddExpense";
pub const UPDATE_EXPENSE: &str = "UpdateExpense";
pub const REMOVE_EXPENSE: &str = "RemoveExpense";

pub const EXPENSE_NOT_FOUND: &str = "Expense not found!";
pub const NO_EXPENSES: &str = "No expenses found!";
pub const OPERATION_SUCCESSFUL: &str = "Operation is successful!";

const SELECTOR_CONFLICT: &str = "At most one of the \"ExpenseId\" or \"Category\" fields can be used!";
const ADD_REQUIRED: &str = "\"Description\", \"Amount\" and \"Category\" are required!";
const UPDATE_REQUIRED: &str = "\"ExpenseId\", \"Description\", \"Amount\" and \"Category\" are required!";
const REMOVE_REQUIRED: &str = "\"ExpenseId\" is required!";
const OWNER_REQUIRED: &str = "\"UserId\" is required!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub expense_id: String,
    pub user_id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
}

/// Optional narrowing of a get request. At most one field may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ExpenseSelector {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.expense_id.is_some() && self.category.is_some() {
            return Err(SELECTOR_CONFLICT);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetExpenseRequest {
    pub user_id: String,
    pub filter: ExpenseSelector,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddExpenseRequest {
    pub user_id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
}

impl AddExpenseRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.description.is_empty() || self.amount == 0.0 || self.category.is_empty() {
            return Err(ADD_REQUIRED);
        }
        require_owner(&self.user_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateExpenseRequest {
    pub user_id: String,
    pub expense_id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
}

impl UpdateExpenseRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.expense_id.is_empty()
            || self.description.is_empty()
            || self.amount == 0.0
            || self.category.is_empty()
        {
            return Err(UPDATE_REQUIRED);
        }
        require_owner(&self.user_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveExpenseRequest {
    pub user_id: String,
    pub expense_id: String,
}

impl RemoveExpenseRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.expense_id.is_empty() {
            return Err(REMOVE_REQUIRED);
        }
        require_owner(&self.user_id)
    }
}

fn require_owner(user_id: &str) -> Result<(), &'static str> {
    if user_id.is_empty() {
        return Err(OWNER_REQUIRED);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseCommand {
    Get(GetExpenseRequest),
    Add(AddExpenseRequest),
    Update(UpdateExpenseRequest),
    Remove(RemoveExpenseRequest),
}

impl ExpenseCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Get(_) => GET_EXPENSE,
            Self::Add(_) => ADD_EXPENSE,
            Self::Update(_) => UPDATE_EXPENSE,
            Self::Remove(_) => REMOVE_EXPENSE,
        }
    }
}

impl CommandSet for ExpenseCommand {
    fn accepts(action: &str) -> bool {
        matches!(action, GET_EXPENSE | ADD_EXPENSE | UPDATE_EXPENSE | REMOVE_EXPENSE)
    }

    fn decode(action: &str, data: Value) -> Result<Self, serde_json::Error> {
        match action {
            GET_EXPENSE => serde_json::from_value(data).map(Self::Get),
            ADD_EXPENSE => serde_json::from_value(data).map(Self::Add),
            UPDATE_EXPENSE => serde_json::from_value(data).map(Self::Update),
            REMOVE_EXPENSE => serde_json::from_value(data).map(Self::Remove),
            other => Err(serde::de::Error::custom(format!("unsupported action {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedExpense {
    pub expense_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseList {
    pub expenses: Vec<Expense>,
}
