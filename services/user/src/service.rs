use async_trait::async_trait;
use shared::envelope::{HandlerResult, GENERIC_FAILURE};
use shared::jwt::{CredentialError, TokenIssuer};
use shared::logger::redact_email;
use shared::router::CommandHandler;
use shared::store::{from_document, to_document, DocumentStore, Filter, StoreError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    LoginData, LoginRequest, RegisterRequest, User, UserCommand, EMAIL_IN_USE, LOGIN_SUCCESSFUL,
    PASSWORD_INVALID, REGISTRATION_SUCCESSFUL, USER_NOT_FOUND,
};
use crate::password::{hash_password, verify_password, PasswordError};

#[derive(Error, Debug)]
pub enum UserServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Worker side of the user service.
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<HandlerResult, UserServiceError> {
        if let Err(message) = request.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let Some(document) = self
            .store
            .find(&Filter::new().eq("email", request.email.as_str()))
            .await?
            .into_iter()
            .next()
        else {
            tracing::info!(email = %redact_email(&request.email), "login for unknown user");
            return Ok(HandlerResult::failure(USER_NOT_FOUND));
        };
        let user: User = from_document(document)?;

        if !verify_password(&request.password, &user.password)? {
            tracing::info!(user_id = %user.user_id, "login with invalid password");
            return Ok(HandlerResult::failure(PASSWORD_INVALID));
        }

        let token = self.tokens.issue(&user.user_id)?;
        tracing::info!(user_id = %user.user_id, "login successful");
        Ok(HandlerResult::with_data(LOGIN_SUCCESSFUL, &LoginData { token }))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<HandlerResult, UserServiceError> {
        if let Err(message) = request.validate() {
            return Ok(HandlerResult::failure(message));
        }

        let taken = self
            .store
            .find(&Filter::new().eq("email", request.email.as_str()))
            .await?;
        if !taken.is_empty() {
            return Ok(HandlerResult::failure(EMAIL_IN_USE));
        }

        let user = User {
            user_id: Uuid::new_v4().to_string(),
            email: request.email,
            password: hash_password(&request.password)?,
            name: request.name,
        };
        self.store.insert(to_document(&user)?).await?;

        tracing::info!(user_id = %user.user_id, email = %redact_email(&user.email), "user registered");
        Ok(HandlerResult::done(REGISTRATION_SUCCESSFUL))
    }
}

#[async_trait]
impl CommandHandler for UserService {
    type Command = UserCommand;

    async fn handle(&self, command: UserCommand) -> HandlerResult {
        let action = command.action();
        let result = match command {
            UserCommand::Login(request) => self.login(request).await,
            UserCommand::Register(request) => self.register(request).await,
        };

        result.unwrap_or_else(|err| {
            tracing::error!(action, error = %err, "user operation failed");
            HandlerResult::failure(GENERIC_FAILURE)
        })
    }
}
