//! Tests for the expense service: payload validation, worker handlers and
//! the authenticated HTTP routes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shared::broker::{Broker, InMemoryBroker};
use shared::dispatcher::RequestDispatcher;
use shared::envelope::HandlerResult;
use shared::jwt::TokenIssuer;
use shared::router::{CommandHandler, CommandRouter, CommandSet};
use shared::store::{DocumentStore, Filter, MemoryStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::models::*;
use crate::router::selector_from_query;
use crate::{create_router, AppState, ExpenseService, EXPENSE_QUEUE};

const SECRET: &str = "expense-test-secret";

fn add_request(user_id: &str, description: &str, amount: f64, category: &str) -> AddExpenseRequest {
    AddExpenseRequest {
        user_id: user_id.to_string(),
        description: description.to_string(),
        amount,
        category: category.to_string(),
    }
}

fn expenses_of(result: &HandlerResult) -> Vec<Expense> {
    let list: ExpenseList = serde_json::from_value(result.data.clone().unwrap()).unwrap();
    list.expenses
}

// ============================================================================
// Payload validation and decoding
// ============================================================================

#[test]
fn test_selector_allows_at_most_one_field() {
    tokio_test::assert_ok!(ExpenseSelector::default().validate());

    let both = ExpenseSelector {
        expense_id: Some("e1".into()),
        category: Some("food".into()),
    };
    assert_eq!(
        both.validate(),
        Err("At most one of the \"ExpenseId\" or \"Category\" fields can be used!")
    );
}

#[test]
fn test_add_requires_fields() {
    tokio_test::assert_ok!(add_request("u1", "coffee", 3.5, "food").validate());
    tokio_test::assert_err!(add_request("u1", "", 3.5, "food").validate());
    assert!(add_request("u1", "coffee", 0.0, "food").validate().is_err());
    assert!(add_request("u1", "coffee", 3.5, "").validate().is_err());
}

#[test]
fn test_update_and_remove_require_expense_id() {
    let update = UpdateExpenseRequest {
        description: "tea".into(),
        amount: 2.0,
        category: "food".into(),
        ..Default::default()
    };
    assert!(update.validate().is_err());
    assert_eq!(
        RemoveExpenseRequest::default().validate(),
        Err("\"ExpenseId\" is required!")
    );
}

#[test]
fn test_commands_require_owner() {
    assert_eq!(
        add_request("", "coffee", 3.5, "food").validate(),
        Err("\"UserId\" is required!")
    );
    let update = UpdateExpenseRequest {
        expense_id: "e1".into(),
        description: "tea".into(),
        amount: 2.0,
        category: "food".into(),
        ..Default::default()
    };
    tokio_test::assert_err!(update.validate());
    let remove = RemoveExpenseRequest {
        expense_id: "e1".into(),
        ..Default::default()
    };
    tokio_test::assert_err!(remove.validate());
}

#[tokio::test]
async fn test_ownerless_add_is_not_stored() {
    let store = Arc::new(MemoryStore::new());
    let service = ExpenseService::new(store.clone());

    let command = ExpenseCommand::decode(
        ADD_EXPENSE,
        json!({"description": "coffee", "amount": 3.5, "category": "food"}),
    )
    .unwrap();
    let result = service.handle(command).await;

    assert!(!result.success);
    assert_eq!(result.message, "\"UserId\" is required!");
    assert!(store.is_empty());
}

#[test]
fn test_command_set_accepts_expense_actions_only() {
    assert!(ExpenseCommand::accepts(GET_EXPENSE));
    assert!(ExpenseCommand::accepts(REMOVE_EXPENSE));
    assert!(!ExpenseCommand::accepts("Login"));
    assert!(!ExpenseCommand::accepts("getexpense"));
}

#[test]
fn test_command_decodes_typed_payload() {
    let command = ExpenseCommand::decode(
        ADD_EXPENSE,
        json!({"userId": "u1", "description": "coffee", "amount": 3.5, "category": "food"}),
    )
    .unwrap();
    assert_eq!(command, ExpenseCommand::Add(add_request("u1", "coffee", 3.5, "food")));
    assert_eq!(command.action(), ADD_EXPENSE);

    let wrong_type = ExpenseCommand::decode(ADD_EXPENSE, json!({"amount": "lots"}));
    assert!(wrong_type.is_err());
}

#[test]
fn test_query_selector() {
    let params = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    };

    let selector = selector_from_query(&params(&[("category", "food")])).unwrap();
    assert_eq!(selector.category.as_deref(), Some("food"));
    assert_eq!(selector.expense_id, None);

    let empty = selector_from_query(&params(&[("category", "")])).unwrap();
    assert_eq!(empty, ExpenseSelector::default());

    assert!(selector_from_query(&params(&[("page", "2")])).is_err());
    assert!(selector_from_query(&params(&[("category", "food"), ("expenseId", "e1")])).is_err());
}

// ============================================================================
// Worker handlers
// ============================================================================

#[tokio::test]
async fn test_add_then_get() {
    let store = Arc::new(MemoryStore::new());
    let service = ExpenseService::new(store.clone());

    let added = service
        .handle(ExpenseCommand::Add(add_request("u1", "coffee", 3.5, "food")))
        .await;
    assert!(added.success);
    let expense_id = added.data.unwrap()["expenseId"].as_str().unwrap().to_string();

    let result = service
        .handle(ExpenseCommand::Get(GetExpenseRequest {
            user_id: "u1".into(),
            filter: ExpenseSelector::default(),
        }))
        .await;
    assert!(result.success);
    assert_eq!(result.message, OPERATION_SUCCESSFUL);

    let expenses = expenses_of(&result);
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].expense_id, expense_id);
    assert_eq!(expenses[0].amount, 3.5);
    assert_eq!(expenses[0].category, "food");
}

#[tokio::test]
async fn test_get_scoped_to_owner_and_selector() {
    let service = ExpenseService::new(Arc::new(MemoryStore::new()));
    service.handle(ExpenseCommand::Add(add_request("u1", "coffee", 3.5, "food"))).await;
    service.handle(ExpenseCommand::Add(add_request("u1", "rent", 900.0, "home"))).await;
    service.handle(ExpenseCommand::Add(add_request("u2", "lunch", 12.0, "food"))).await;

    let result = service
        .handle(ExpenseCommand::Get(GetExpenseRequest {
            user_id: "u1".into(),
            filter: ExpenseSelector {
                category: Some("food".into()),
                ..Default::default()
            },
        }))
        .await;

    let expenses = expenses_of(&result);
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].description, "coffee");
}

#[tokio::test]
async fn test_get_empty_is_success() {
    let service = ExpenseService::new(Arc::new(MemoryStore::new()));
    let result = service
        .handle(ExpenseCommand::Get(GetExpenseRequest {
            user_id: "nobody".into(),
            filter: ExpenseSelector::default(),
        }))
        .await;

    assert!(result.success);
    assert_eq!(result.message, NO_EXPENSES);
    assert!(expenses_of(&result).is_empty());
}

#[tokio::test]
async fn test_get_with_both_selectors_fails() {
    let service = ExpenseService::new(Arc::new(MemoryStore::new()));
    let result = service
        .handle(ExpenseCommand::Get(GetExpenseRequest {
            user_id: "u1".into(),
            filter: ExpenseSelector {
                expense_id: Some("e1".into()),
                category: Some("food".into()),
            },
        }))
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn test_update_foreign_expense_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = ExpenseService::new(store.clone());
    let added = service
        .handle(ExpenseCommand::Add(add_request("owner", "coffee", 3.5, "food")))
        .await;
    let expense_id = added.data.unwrap()["expenseId"].as_str().unwrap().to_string();

    let result = service
        .handle(ExpenseCommand::Update(UpdateExpenseRequest {
            user_id: "intruder".into(),
            expense_id: expense_id.clone(),
            description: "stolen".into(),
            amount: 1.0,
            category: "misc".into(),
        }))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, EXPENSE_NOT_FOUND);

    let stored = store.find(&Filter::new().eq("expenseId", expense_id.as_str())).await.unwrap();
    assert_eq!(stored[0].get("description"), Some(&json!("coffee")));
}

#[tokio::test]
async fn test_update_replaces_owned_expense() {
    let store = Arc::new(MemoryStore::new());
    let service = ExpenseService::new(store.clone());
    let added = service
        .handle(ExpenseCommand::Add(add_request("u1", "coffee", 3.5, "food")))
        .await;
    let expense_id = added.data.unwrap()["expenseId"].as_str().unwrap().to_string();

    let result = service
        .handle(ExpenseCommand::Update(UpdateExpenseRequest {
            user_id: "u1".into(),
            expense_id: expense_id.clone(),
            description: "espresso".into(),
            amount: 4.0,
            category: "food".into(),
        }))
        .await;
    assert!(result.success);

    let stored = store.find(&Filter::new().eq("expenseId", expense_id.as_str())).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("description"), Some(&json!("espresso")));
    assert_eq!(stored[0].get("userId"), Some(&json!("u1")));
}

#[tokio::test]
async fn test_remove_owned_expense() {
    let store = Arc::new(MemoryStore::new());
    let service = ExpenseService::new(store.clone());
    let added = service
        .handle(ExpenseCommand::Add(add_request("u1", "coffee", 3.5, "food")))
        .await;
    let expense_id = added.data.unwrap()["expenseId"].as_str().unwrap().to_string();

    let missing = service
        .handle(ExpenseCommand::Remove(RemoveExpenseRequest {
            user_id: "u2".into(),
            expense_id: expense_id.clone(),
        }))
        .await;
    assert_eq!(missing.message, EXPENSE_NOT_FOUND);
    assert_eq!(store.len(), 1);

    let removed = service
        .handle(ExpenseCommand::Remove(RemoveExpenseRequest {
            user_id: "u1".into(),
            expense_id,
        }))
        .await;
    assert!(removed.success);
    assert!(store.is_empty());
}

// ============================================================================
// HTTP routes
// ============================================================================

struct Harness {
    app: Router,
    broker: InMemoryBroker,
    store: Arc<MemoryStore>,
    tokens: TokenIssuer,
    shutdown: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn harness() -> Harness {
    let broker = InMemoryBroker::new();
    broker.declare_queue(EXPENSE_QUEUE).await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();

    let worker = CommandRouter::new(
        Arc::new(broker.clone()),
        EXPENSE_QUEUE,
        ExpenseService::new(store.clone()),
    );
    tokio::spawn(worker.run(shutdown.clone()));

    let tokens = TokenIssuer::new(SECRET, chrono::Duration::hours(1));
    let dispatcher = RequestDispatcher::new(Arc::new(broker.clone()), EXPENSE_QUEUE, Duration::from_secs(5));
    let app = create_router(AppState::new(dispatcher, tokens.clone()));

    Harness {
        app,
        broker,
        store,
        tokens,
        shutdown,
    }
}

impl Harness {
    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, String) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let harness = harness().await;
    let (status, body) = harness.send("GET", "/health", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_expense_routes_require_token() {
    let harness = harness().await;
    let (status, body) = harness.send("GET", "/expense", None, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorized");

    let (status, _) = harness.send("GET", "/expense", Some("not-a-token"), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(harness.broker.published_count(), 0);
}

#[tokio::test]
async fn test_add_and_list_over_http() {
    let harness = harness().await;
    let token = harness.tokens.issue("u1").unwrap();

    let (status, body) = harness
        .send(
            "POST",
            "/expense",
            Some(&token),
            r#"{"description":"coffee","amount":3.5,"category":"food"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let added: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(added["success"], json!(true));
    assert!(added["expenseId"].is_string());

    let (status, body) = harness.send("GET", "/expense?category=food", Some(&token), "").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed["expense"][0]["description"], json!("coffee"));
    assert_eq!(listed["expense"][0]["userId"], json!("u1"));
    assert_eq!(listed["expense"][0]["expenseId"], added["expenseId"]);
}

#[tokio::test]
async fn test_user_id_comes_from_token() {
    let harness = harness().await;
    let token = harness.tokens.issue("u1").unwrap();

    let (status, _) = harness
        .send(
            "POST",
            "/expense",
            Some(&token),
            r#"{"userId":"someone-else","description":"coffee","amount":3.5,"category":"food"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let owned = harness.store.find(&Filter::new().eq("userId", "u1")).await.unwrap();
    assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn test_invalid_query_rejected_before_publish() {
    let harness = harness().await;
    let token = harness.tokens.issue("u1").unwrap();

    let (status, body) = harness.send("GET", "/expense?page=2", Some(&token), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid query parameter!");

    let (status, _) = harness
        .send("GET", "/expense?expenseId=e1&category=food", Some(&token), "")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.broker.published_count(), 0);
}

#[tokio::test]
async fn test_malformed_and_incomplete_bodies() {
    let harness = harness().await;
    let token = harness.tokens.issue("u1").unwrap();

    let (status, body) = harness.send("POST", "/expense", Some(&token), "{broken").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Format is invalid!");

    let (status, body) = harness
        .send("POST", "/expense", Some(&token), r#"{"description":"coffee"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "\"Description\", \"Amount\" and \"Category\" are required!");

    let (status, _) = harness.send("DELETE", "/expense", Some(&token), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.broker.published_count(), 0);
}

#[tokio::test]
async fn test_update_unknown_expense_is_unauthorized() {
    let harness = harness().await;
    let token = harness.tokens.issue("u1").unwrap();

    let (status, body) = harness
        .send(
            "PUT",
            "/expense",
            Some(&token),
            r#"{"expenseId":"missing","description":"tea","amount":2,"category":"food"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());
}
