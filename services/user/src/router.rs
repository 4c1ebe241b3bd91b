use axum::{body::Bytes, extract::State, middleware, routing::get, routing::post, Json, Router};
use serde::Serialize;
use shared::dispatcher::RequestDispatcher;
use shared::http::{health_check, parse_json, request_logging, GatewayError};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::models::{LoginData, LoginRequest, RegisterRequest, LOGIN, REGISTER};

const TOKEN_MISSING: &str = "\"Token\" field is not found!";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
}

impl AppState {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub success: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/user/login", post(login))
        .route("/user/register", post(register))
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>, GatewayError> {
    let request: LoginRequest = parse_json(&body)?;
    request.validate().map_err(GatewayError::bad_request)?;

    let result = state.dispatcher.call::<_, LoginData>(LOGIN, &request).await?;
    let token = result
        .data
        .map(|data| data.token)
        .ok_or_else(|| GatewayError::Internal(TOKEN_MISSING.to_string()))?;

    Ok(Json(LoginResponse {
        message: result.message,
        success: true,
        token,
    }))
}

async fn register(State(state): State<AppState>, body: Bytes) -> Result<Json<RegisterResponse>, GatewayError> {
    let request: RegisterRequest = parse_json(&body)?;
    request.validate().map_err(GatewayError::bad_request)?;

    let result = state
        .dispatcher
        .call::<_, serde_json::Value>(REGISTER, &request)
        .await?;

    Ok(Json(RegisterResponse {
        message: result.message,
        success: true,
    }))
}
