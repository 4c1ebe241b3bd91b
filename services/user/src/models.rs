use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::router::CommandSet;

pub const LOGIN: &str = "Login";
pub const REGISTER: &str = "Register";

pub const USER_NOT_FOUND: &str = "User not found!";
pub const PASSWORD_INVALID: &str = "Password is invalid!";
pub const LOGIN_SUCCESSFUL: &str = "Login is successful!";
pub const EMAIL_IN_USE: &str = "Email is already in use!";
pub const REGISTRATION_SUCCESSFUL: &str = "Registration is successful!";

const LOGIN_REQUIRED: &str = "\"Email\" and \"Password\" are required!";
const REGISTER_REQUIRED: &str = "\"Email\", \"Password\" and \"Name\" are required!";

/// Stored user. `password` holds an argon2 PHC string, never plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(LOGIN_REQUIRED);
        }
        Ok(())
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.is_empty() || self.password.is_empty() || self.name.is_empty() {
            return Err(REGISTER_REQUIRED);
        }
        Ok(())
    }
}

// Requests carry plaintext passwords; keep them out of debug output.
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Login(LoginRequest),
    Register(RegisterRequest),
}

impl UserCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Login(_) => LOGIN,
            Self::Register(_) => REGISTER,
        }
    }
}

impl CommandSet for UserCommand {
    fn accepts(action: &str) -> bool {
        matches!(action, LOGIN | REGISTER)
    }

    fn decode(action: &str, data: Value) -> Result<Self, serde_json::Error> {
        match action {
            LOGIN => serde_json::from_value(data).map(Self::Login),
            REGISTER => serde_json::from_value(data).map(Self::Register),
            other => Err(serde::de::Error::custom(format!("unsupported action {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
}
