use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Operador,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Role::Admin,
            "operador" => Role::Operador,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operador => write!(f, "operador"),
            Role::Other(other) => write!(f, "{}", other),
        }
    }
}

/// 登入後取得的工作階段，明確注入每個需要授權的客戶端
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: String,
    #[serde(rename = "rol")]
    role: Role,
    #[serde(rename = "usuario")]
    username: String,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role,
            username: username.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// token 不進日誌
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
