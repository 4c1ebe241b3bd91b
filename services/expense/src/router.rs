use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use shared::dispatcher::RequestDispatcher;
use shared::http::{health_check, parse_json, request_logging, GatewayError};
use shared::jwt::TokenIssuer;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::middleware::{authenticate, Identity};
use crate::models::{
    AddExpenseRequest, AddedExpense, Expense, ExpenseList, ExpenseSelector, GetExpenseRequest,
    RemoveExpenseRequest, UpdateExpenseRequest, ADD_EXPENSE, GET_EXPENSE, REMOVE_EXPENSE,
    UPDATE_EXPENSE,
};

const INVALID_QUERY: &str = "Invalid query parameter!";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(dispatcher: RequestDispatcher, tokens: TokenIssuer) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            tokens: Arc::new(tokens),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct GetExpenseResponse {
    pub message: String,
    pub success: bool,
    #[serde(rename = "expense")]
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddExpenseResponse {
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    let expense_routes = Router::new()
        .route(
            "/expense",
            get(get_expense)
                .post(add_expense)
                .put(update_expense)
                .delete(remove_expense),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/health", get(health_check))
        .merge(expense_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the selector from `expenseId` / `category` query parameters.
/// Empty values count as absent.
pub fn selector_from_query(params: &HashMap<String, String>) -> Result<ExpenseSelector, GatewayError> {
    if params.keys().any(|key| key != "expenseId" && key != "category") {
        return Err(GatewayError::bad_request(INVALID_QUERY));
    }

    let value = |key: &str| params.get(key).filter(|value| !value.is_empty()).cloned();
    let selector = ExpenseSelector {
        expense_id: value("expenseId"),
        category: value("category"),
    };
    selector.validate().map_err(GatewayError::bad_request)?;
    Ok(selector)
}

async fn get_expense(
    State(state): State<AppState>,
    Extension(Identity(user_id)): Extension<Identity>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetExpenseResponse>, GatewayError> {
    let request = GetExpenseRequest {
        user_id,
        filter: selector_from_query(&params)?,
    };

    let result = state
        .dispatcher
        .call::<_, ExpenseList>(GET_EXPENSE, &request)
        .await?;

    Ok(Json(GetExpenseResponse {
        message: result.message,
        success: true,
        expenses: result.data.unwrap_or_default().expenses,
    }))
}

async fn add_expense(
    State(state): State<AppState>,
    Extension(Identity(user_id)): Extension<Identity>,
    body: Bytes,
) -> Result<Json<AddExpenseResponse>, GatewayError> {
    let mut request: AddExpenseRequest = parse_json(&body)?;
    request.user_id = user_id;
    request.validate().map_err(GatewayError::bad_request)?;

    let result = state
        .dispatcher
        .call::<_, AddedExpense>(ADD_EXPENSE, &request)
        .await?;

    Ok(Json(AddExpenseResponse {
        message: result.message,
        success: true,
        expense_id: result.data.map(|added| added.expense_id),
    }))
}

async fn update_expense(
    State(state): State<AppState>,
    Extension(Identity(user_id)): Extension<Identity>,
    body: Bytes,
) -> Result<Json<OperationResponse>, GatewayError> {
    let mut request: UpdateExpenseRequest = parse_json(&body)?;
    request.user_id = user_id;
    request.validate().map_err(GatewayError::bad_request)?;

    let result = state
        .dispatcher
        .call::<_, serde_json::Value>(UPDATE_EXPENSE, &request)
        .await?;

    Ok(Json(OperationResponse {
        message: result.message,
        success: true,
    }))
}

async fn remove_expense(
    State(state): State<AppState>,
    Extension(Identity(user_id)): Extension<Identity>,
    body: Bytes,
) -> Result<Json<OperationResponse>, GatewayError> {
    let mut request: RemoveExpenseRequest = parse_json(&body)?;
    request.user_id = user_id;
    request.validate().map_err(GatewayError::bad_request)?;

    let result = state
        .dispatcher
        .call::<_, serde_json::Value>(REMOVE_EXPENSE, &request)
        .await?;

    Ok(Json(OperationResponse {
        message: result.message,
        success: true,
    }))
}
