//! Bearer-token authentication for the expense routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use shared::http::GatewayError;
use shared::jwt::bearer_token;

use crate::router::AppState;

/// User the request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(GatewayError::Unauthorized)?;

    let claims = state.tokens.verify(token).map_err(|err| {
        tracing::debug!(error = %err, "token verification failed");
        GatewayError::Unauthorized
    })?;

    request.extensions_mut().insert(Identity(claims.user_id));
    Ok(next.run(request).await)
}
